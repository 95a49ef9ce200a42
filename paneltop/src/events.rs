//! In-process fan-out of decoded daemon events.
//!
//! Components hold a [`Subscription`] for the event kinds they care about.
//! Dropping the subscription unregisters it, so nothing is delivered to a
//! component after teardown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::types::{EventKind, ServerEvent};

struct Listener {
    kinds: Vec<EventKind>,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<u64, Listener>,
}

type SharedRegistry = Arc<Mutex<Registry>>;

#[derive(Clone, Default)]
pub struct EventBus {
    registry: SharedRegistry,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut reg = lock(&self.registry);
        let id = reg.next_id;
        reg.next_id += 1;
        reg.listeners.insert(
            id,
            Listener {
                kinds: kinds.to_vec(),
                tx,
            },
        );
        tracing::trace!(id, ?kinds, "subscribed");
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
            rx,
        }
    }

    /// Deliver `ev` to every subscription interested in its kind.
    /// Returns how many listeners received it.
    pub fn publish(&self, ev: ServerEvent) -> usize {
        let kind = ev.kind();
        let reg = lock(&self.registry);
        let mut delivered = 0;
        for l in reg.listeners.values().filter(|l| l.kinds.contains(&kind)) {
            if l.tx.send(ev.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }
}

// A poisoned registry only means a listener panicked mid-insert; the map is still usable
fn lock(reg: &Mutex<Registry>) -> std::sync::MutexGuard<'_, Registry> {
    reg.lock().unwrap_or_else(|e| e.into_inner())
}

/// Scoped registration on an [`EventBus`]. Unsubscribes on drop.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
    rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Subscription {
    /// Next queued event, if any. Never blocks.
    pub fn try_next(&mut self) -> Option<ServerEvent> {
        match self.rx.try_recv() {
            Ok(ev) => Some(ev),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Drain everything queued so far, in delivery order.
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(reg) = self.registry.upgrade() {
            lock(&reg).listeners.remove(&self.id);
            tracing::trace!(id = self.id, "unsubscribed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PowerStatus;

    #[test]
    fn delivers_only_matching_kinds_in_order() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(&[EventKind::ConsoleOutput]);
        bus.publish(ServerEvent::ConsoleOutput("a".into()));
        bus.publish(ServerEvent::Status(PowerStatus::Running));
        bus.publish(ServerEvent::ConsoleOutput("b".into()));
        assert_eq!(
            sub.drain(),
            vec![
                ServerEvent::ConsoleOutput("a".into()),
                ServerEvent::ConsoleOutput("b".into())
            ]
        );
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let bus = EventBus::new();
        let sub = bus.subscribe(&[EventKind::Status]);
        assert_eq!(bus.listener_count(), 1);
        drop(sub);
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(bus.publish(ServerEvent::Status(PowerStatus::Offline)), 0);
    }

    #[test]
    fn fans_out_to_every_interested_listener() {
        let bus = EventBus::new();
        let mut a = bus.subscribe(&[EventKind::Status]);
        let mut b = bus.subscribe(&[EventKind::Status, EventKind::Stats]);
        assert_eq!(bus.publish(ServerEvent::Status(PowerStatus::Starting)), 2);
        assert_eq!(a.drain().len(), 1);
        assert_eq!(b.drain().len(), 1);
    }

    #[test]
    fn subscription_outliving_bus_is_harmless() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(&[EventKind::Stats]);
        drop(bus);
        assert!(sub.try_next().is_none());
        drop(sub);
    }
}
