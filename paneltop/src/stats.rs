//! Consumes `stats` events: turns raw counters into chart samples and the
//! point-in-time values shown in the details blocks.

use chrono::{DateTime, Local};

use crate::chart::{MetricChart, ACCENT, ACCENT_ALT};
use crate::details::Limits;
use crate::events::{EventBus, Subscription};
use crate::session::{SessionView, Transport};
use crate::types::{EventKind, NetworkCounters, OutboundRequest, PowerStatus, ServerEvent, StatsPayload};

const MIB: u64 = 1024 * 1024;

/// Turns cumulative rx/tx counters into per-interval deltas.
#[derive(Debug, Default, Clone)]
pub struct NetworkDeltas {
    previous: Option<NetworkCounters>,
}

impl NetworkDeltas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `(rx, tx)` since the last call. The first sample yields zero and
    /// a counter that went backwards (container restart) clamps to zero.
    pub fn next(&mut self, current: NetworkCounters) -> (u64, u64) {
        let out = match self.previous {
            None => (0, 0),
            Some(prev) => (
                current.rx_bytes.saturating_sub(prev.rx_bytes),
                current.tx_bytes.saturating_sub(prev.tx_bytes),
            ),
        };
        self.previous = Some(current);
        out
    }
}

/// Latest values for the non-chart stat blocks.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PointInTimeStats {
    pub memory_bytes: u64,
    pub cpu: f64,
    pub disk_bytes: u64,
    pub uptime_ms: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

pub struct StatsConsumer {
    pub cpu: MetricChart,
    pub memory: MetricChart,
    pub network: MetricChart,
    current: PointInTimeStats,
    updated_at: Option<DateTime<Local>>,
    deltas: NetworkDeltas,
    last_status: Option<Option<PowerStatus>>,
    was_usable: bool,
    subscription: Option<Subscription>,
}

impl StatsConsumer {
    pub fn new(limits: &Limits) -> Self {
        let cpu = MetricChart::with_tick_label("CPU", limits.cpu, "%", Some(2));
        let memory =
            MetricChart::with_tick_label("Memory", limits.memory_mib.map(|m| m as f64), "MiB", None);
        let network = MetricChart::bytes("Network", 2, |mut d, i| {
            d.label = if i == 0 { "Inbound" } else { "Outbound" }.into();
            d.color = if i == 0 { ACCENT } else { ACCENT_ALT };
            d
        });
        Self {
            cpu,
            memory,
            network,
            current: PointInTimeStats::default(),
            updated_at: None,
            deltas: NetworkDeltas::new(),
            last_status: None,
            was_usable: false,
            subscription: None,
        }
    }

    pub fn activate(&mut self, bus: &EventBus) {
        if self.subscription.is_none() {
            // Status rides the same queue so an offline reset lands after
            // every sample delivered before it
            self.subscription = Some(bus.subscribe(&[EventKind::Stats, EventKind::Status]));
        }
    }

    /// Drops the subscription; anything still queued is discarded.
    pub fn deactivate(&mut self) {
        self.subscription = None;
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn current(&self) -> &PointInTimeStats {
        &self.current
    }

    /// Local time of the last applied sample.
    pub fn updated_at(&self) -> Option<DateTime<Local>> {
        self.updated_at
    }

    /// Run once per UI tick: requests a snapshot on connect, then replays
    /// queued samples and status changes in delivery order.
    pub fn sync(&mut self, view: &SessionView, transport: &dyn Transport) {
        let usable = view.connection.usable();
        if usable && !self.was_usable {
            if let Err(e) = transport.send(OutboundRequest::SendStats) {
                tracing::debug!(error = %e, "stats snapshot request not sent");
            }
        }
        self.was_usable = usable;

        let events = self
            .subscription
            .as_mut()
            .map(Subscription::drain)
            .unwrap_or_default();
        for ev in events {
            match ev {
                ServerEvent::Stats(p) => self.apply(&p),
                ServerEvent::Status(s) => self.observe_status(Some(s)),
                _ => {}
            }
        }

        // Status changes that did not come from an event (e.g. token rejected)
        self.observe_status(view.status);
    }

    /// Clears charts and zeroes the blocks when the server turns offline.
    pub fn observe_status(&mut self, status: Option<PowerStatus>) {
        if self.last_status == Some(status) {
            return;
        }
        self.last_status = Some(status);
        if status == Some(PowerStatus::Offline) {
            self.reset();
        }
    }

    pub fn reset(&mut self) {
        self.cpu.clear();
        self.memory.clear();
        self.network.clear();
        self.current = PointInTimeStats::default();
        self.updated_at = None;
    }

    /// Parse and apply a raw payload. Malformed input is dropped and leaves
    /// the charts untouched; returns whether it was applied.
    pub fn ingest_raw(&mut self, raw: &str) -> bool {
        match StatsPayload::parse(raw) {
            Ok(p) => {
                self.apply(&p);
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "discarding malformed stats payload");
                false
            }
        }
    }

    pub fn apply(&mut self, p: &StatsPayload) {
        let (rx, tx) = self.deltas.next(p.network);
        self.cpu.push_one(Some(p.cpu_absolute));
        self.memory.push_one(Some((p.memory_bytes / MIB) as f64));
        self.network.push(&[Some(rx as f64), Some(tx as f64)]);

        self.current = PointInTimeStats {
            memory_bytes: p.memory_bytes,
            cpu: p.cpu_absolute,
            disk_bytes: p.disk_bytes,
            uptime_ms: p.uptime,
            rx_bytes: p.network.rx_bytes,
            tx_bytes: p.network.tx_bytes,
        };
        self.updated_at = Some(Local::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ConnectionState, MemoryTransport};

    fn counters(rx: u64, tx: u64) -> NetworkCounters {
        NetworkCounters {
            rx_bytes: rx,
            tx_bytes: tx,
        }
    }

    fn payload(mem: u64, cpu: f64, rx: u64, tx: u64) -> String {
        format!(
            r#"{{"memory_bytes":{mem},"cpu_absolute":{cpu},"disk_bytes":4096,"network":{{"rx_bytes":{rx},"tx_bytes":{tx}}},"uptime":1000}}"#
        )
    }

    fn online() -> SessionView {
        SessionView {
            connection: ConnectionState {
                connected: true,
                has_session: true,
            },
            status: Some(PowerStatus::Running),
            transferring: false,
            installing: false,
        }
    }

    #[test]
    fn deltas_clamp_counter_reset() {
        let mut d = NetworkDeltas::new();
        let got: Vec<u64> = [100, 250, 90].iter().map(|&v| d.next(counters(v, v)).0).collect();
        assert_eq!(got, vec![0, 150, 0]);
        // previous value is tracked from the reset point onwards
        assert_eq!(d.next(counters(200, 200)), (110, 110));
    }

    #[test]
    fn malformed_payload_leaves_state() {
        let mut s = StatsConsumer::new(&Limits::default());
        assert!(s.ingest_raw(&payload(3 * MIB, 10.0, 1, 1)));
        let before_cpu: Vec<_> = s.cpu.points(0);
        let before = *s.current();
        assert!(!s.ingest_raw("{not valid"));
        assert_eq!(s.cpu.points(0), before_cpu);
        assert_eq!(*s.current(), before);
    }

    #[test]
    fn applies_values_to_charts_and_blocks() {
        let mut s = StatsConsumer::new(&Limits::default());
        s.ingest_raw(&payload(5 * MIB + 12, 33.333, 100, 10));
        s.ingest_raw(&payload(5 * MIB, 40.0, 300, 60));
        assert_eq!(s.cpu.latest(0), Some(40.0));
        assert_eq!(s.memory.latest(0), Some(5.0));
        assert_eq!(s.network.latest(0), Some(200.0), "inbound");
        assert_eq!(s.network.latest(1), Some(50.0), "outbound");
        assert_eq!(s.current().rx_bytes, 300);
        assert_eq!(s.current().disk_bytes, 4096);
    }

    #[test]
    fn offline_transition_clears_everything() {
        let mut s = StatsConsumer::new(&Limits::default());
        s.observe_status(Some(PowerStatus::Running));
        s.ingest_raw(&payload(MIB, 5.0, 1, 1));
        s.observe_status(Some(PowerStatus::Offline));
        assert!(s.cpu.is_cleared());
        assert!(s.memory.is_cleared());
        assert!(s.network.is_cleared());
        assert_eq!(*s.current(), PointInTimeStats::default());
        assert!(s.updated_at().is_none());
    }

    #[test]
    fn sample_before_offline_in_same_tick_is_cleared() {
        let bus = EventBus::new();
        let t = MemoryTransport::new();
        let mut s = StatsConsumer::new(&Limits::default());
        s.activate(&bus);
        bus.publish(ServerEvent::Status(PowerStatus::Running));
        s.sync(&online(), &t);

        let p = StatsPayload::parse(&payload(MIB, 12.5, 0, 0)).unwrap();
        bus.publish(ServerEvent::Stats(p));
        bus.publish(ServerEvent::Status(PowerStatus::Offline));
        let offline = SessionView {
            status: Some(PowerStatus::Offline),
            ..online()
        };
        s.sync(&offline, &t);
        assert!(s.cpu.is_cleared());
        assert_eq!(*s.current(), PointInTimeStats::default());
    }

    #[test]
    fn offline_flap_within_one_tick_still_resets() {
        let bus = EventBus::new();
        let t = MemoryTransport::new();
        let mut s = StatsConsumer::new(&Limits::default());
        s.activate(&bus);
        bus.publish(ServerEvent::Status(PowerStatus::Running));
        s.ingest_raw(&payload(MIB, 3.0, 0, 0));
        s.sync(&online(), &t);
        assert!(!s.cpu.is_cleared());

        bus.publish(ServerEvent::Status(PowerStatus::Offline));
        bus.publish(ServerEvent::Status(PowerStatus::Starting));
        let starting = SessionView {
            status: Some(PowerStatus::Starting),
            ..online()
        };
        s.sync(&starting, &t);
        assert!(s.cpu.is_cleared());
    }

    #[test]
    fn sync_requests_snapshot_once_per_connect() {
        let bus = EventBus::new();
        let t = MemoryTransport::new();
        let mut s = StatsConsumer::new(&Limits::default());
        s.activate(&bus);
        s.sync(&online(), &t);
        s.sync(&online(), &t);
        assert_eq!(t.sent(), vec![OutboundRequest::SendStats]);

        s.sync(&SessionView::default(), &t);
        s.sync(&online(), &t);
        assert_eq!(t.sent().len(), 2);
    }

    #[test]
    fn sync_applies_queued_events_and_ignores_after_teardown() {
        let bus = EventBus::new();
        let t = MemoryTransport::new();
        let mut s = StatsConsumer::new(&Limits::default());
        s.activate(&bus);
        let p = StatsPayload::parse(&payload(MIB, 7.5, 0, 0)).unwrap();
        bus.publish(ServerEvent::Stats(p.clone()));
        s.sync(&online(), &t);
        assert_eq!(s.cpu.latest(0), Some(7.5));

        s.deactivate();
        assert_eq!(bus.publish(ServerEvent::Stats(p)), 0);
        assert!(!s.is_active());
    }
}
