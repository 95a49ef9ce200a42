//! App state and main loop: input handling, draining server events into the
//! console and charts, and drawing.

use std::{io, time::Duration};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};
use tokio::time::sleep;

use crate::console::ConsoleSession;
use crate::details::{blocks, Limits};
use crate::events::{EventBus, Subscription};
use crate::power::{PowerButton, PowerControls};
use crate::session::{ConnectionState, SessionView, Transport};
use crate::stats::StatsConsumer;
use crate::store::KeyedStore;
use crate::types::{EventKind, PowerStatus, ServerEvent, TransferStatus};
use crate::ui::{
    charts::draw_metric_chart,
    console::draw_console,
    details::draw_details,
    header::draw_header,
    power::{draw_kill_dialog, draw_power_bar},
};
use crate::ws::{spawn_connection, ConnectConfig, LinkState};

const TICK: Duration = Duration::from_millis(50);

/// Everything the app needs to know about the server it is attached to.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Key the command history is stored under.
    pub server_key: String,
    pub address: String,
    pub limits: Limits,
    pub connect: ConnectConfig,
}

pub struct App {
    config: AppConfig,
    bus: EventBus,
    store: KeyedStore,

    pub stats: StatsConsumer,
    pub console: ConsoleSession,
    pub power: PowerControls,

    // Server state fed from the socket
    status: Option<PowerStatus>,
    transferring: bool,
    installing: bool,
    server_events: Subscription,

    should_quit: bool,
}

impl App {
    pub fn new(config: AppConfig, store: KeyedStore) -> Self {
        let bus = EventBus::new();
        let mut stats = StatsConsumer::new(&config.limits);
        stats.activate(&bus);
        let console = ConsoleSession::restore(&config.server_key, &store);
        let server_events = bus.subscribe(&[
            EventKind::Status,
            EventKind::TransferLogs,
            EventKind::TransferStatus,
            EventKind::InstallStarted,
            EventKind::InstallCompleted,
        ]);
        Self {
            config,
            bus,
            store,
            stats,
            console,
            power: PowerControls::new(),
            status: None,
            transferring: false,
            installing: false,
            server_events,
            should_quit: false,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn status(&self) -> Option<PowerStatus> {
        self.status
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn view(&self, link: LinkState) -> SessionView {
        SessionView {
            connection: ConnectionState {
                connected: link == LinkState::Connected,
                has_session: link != LinkState::Rejected,
            },
            status: self.status,
            transferring: self.transferring,
            installing: self.installing,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        // Connection runs in the background and reconnects on its own
        let ws = spawn_connection(self.config.connect.clone(), self.bus.clone());

        // Terminal setup
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        // Main loop
        let res = self.event_loop(&mut terminal, &ws).await;

        // Teardown
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        res
    }

    async fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        ws: &crate::ws::WsHandle,
    ) -> anyhow::Result<()> {
        loop {
            // Input (non-blocking)
            while event::poll(Duration::from_millis(10))? {
                if let Event::Key(k) = event::read()? {
                    if k.kind == KeyEventKind::Press {
                        let view = self.view(ws.link());
                        self.handle_key(k, &view, ws);
                    }
                }
            }
            if self.should_quit {
                break;
            }

            let link = ws.link();
            self.tick(link, ws);

            terminal.draw(|f| self.draw(f, link))?;

            sleep(TICK).await;
        }
        tracing::info!("quit");
        Ok(())
    }

    /// Update the session snapshot from queued server state, then let the
    /// console, charts and power controls catch up. Each consumer replays its
    /// own events in delivery order.
    pub fn tick(&mut self, link: LinkState, transport: &dyn Transport) {
        for ev in self.server_events.drain() {
            match ev {
                ServerEvent::Status(s) => self.status = Some(s),
                ServerEvent::TransferLogs(_) => self.transferring = true,
                ServerEvent::TransferStatus(TransferStatus::Failure) => self.transferring = false,
                ServerEvent::TransferStatus(TransferStatus::Other(s)) if s == "completed" => {
                    self.transferring = false
                }
                ServerEvent::InstallStarted => self.installing = true,
                ServerEvent::InstallCompleted => self.installing = false,
                _ => {}
            }
        }
        if link == LinkState::Rejected && self.status.is_some() {
            self.status = None;
        }

        let view = self.view(link);
        self.stats.sync(&view, transport);
        self.console.sync(&self.bus, &view, transport);
        self.power.observe_status(view.status);
    }

    pub fn handle_key(&mut self, k: KeyEvent, view: &SessionView, transport: &dyn Transport) {
        if k.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(k.code, KeyCode::Char('c') | KeyCode::Char('q'))
        {
            self.should_quit = true;
            return;
        }

        // The kill dialog is modal
        if self.power.confirming_kill() {
            match k.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.power.confirm(view, transport);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => self.power.dismiss(),
                _ => {}
            }
            return;
        }

        let button = match k.code {
            KeyCode::F(1) => Some(PowerButton::Start),
            KeyCode::F(2) => Some(PowerButton::Restart),
            KeyCode::F(3) => Some(PowerButton::Stop),
            _ => None,
        };
        if let Some(b) = button {
            self.power.press(b, view, transport);
            return;
        }

        self.console
            .handle_key(k, view, transport, Some(&mut self.store));
    }

    pub fn draw(&mut self, f: &mut ratatui::Frame<'_>, link: LinkState) {
        let area = f.area();
        let view = self.view(link);

        // Root rows: header, details, body, power bar
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(1),
            ])
            .split(area);

        draw_header(
            f,
            rows[0],
            &self.config.server_key,
            self.status,
            link,
            self.stats.updated_at(),
        );

        let details = blocks(
            &self.config.address,
            self.status,
            self.stats.current(),
            &self.config.limits,
        );
        draw_details(f, rows[1], &details);

        // Body: console (left), charts stacked (right)
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(rows[2]);
        draw_console(f, body[0], &self.console, self.console.input_enabled(&view));

        let charts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(body[1]);
        draw_metric_chart(f, charts[0], &self.stats.cpu);
        draw_metric_chart(f, charts[1], &self.stats.memory);
        draw_metric_chart(f, charts[2], &self.stats.network);

        draw_power_bar(f, rows[3], self.status, view.lock_notice());

        if self.power.confirming_kill() {
            draw_kill_dialog(f, area);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ConsoleState;
    use crate::session::MemoryTransport;
    use crate::types::{OutboundRequest, PowerAction, StatsPayload};
    use ratatui::backend::TestBackend;

    fn app() -> (App, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyedStore::open(dir.path().join("state.json"));
        let cfg = AppConfig {
            server_key: "abc".into(),
            address: "127.0.0.1:25565".into(),
            ..Default::default()
        };
        (App::new(cfg, store), dir)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn connect_requests_logs_and_stats() {
        let (mut app, _d) = app();
        let t = MemoryTransport::new();
        app.tick(LinkState::Connected, &t);
        let sent = t.sent();
        assert!(sent.contains(&OutboundRequest::SendLogs));
        assert!(sent.contains(&OutboundRequest::SendStats));
        assert_eq!(app.console.state(), ConsoleState::Connected);
    }

    #[test]
    fn status_event_updates_snapshot_and_offline_clears_charts() {
        let (mut app, _d) = app();
        let t = MemoryTransport::new();
        app.tick(LinkState::Connected, &t);
        app.bus().publish(ServerEvent::Status(PowerStatus::Running));
        let p = StatsPayload::parse(
            r#"{"memory_bytes":1048576,"cpu_absolute":12.5,"disk_bytes":0,"network":{"rx_bytes":0,"tx_bytes":0}}"#,
        )
        .unwrap();
        app.bus().publish(ServerEvent::Stats(p));
        app.tick(LinkState::Connected, &t);
        assert_eq!(app.status(), Some(PowerStatus::Running));
        assert_eq!(app.stats.cpu.latest(0), Some(12.5));

        app.bus().publish(ServerEvent::Status(PowerStatus::Offline));
        app.tick(LinkState::Connected, &t);
        assert!(app.stats.cpu.is_cleared());
    }

    #[test]
    fn offline_after_sample_in_one_tick_leaves_charts_cleared() {
        let (mut app, _d) = app();
        let t = MemoryTransport::new();
        app.bus().publish(ServerEvent::Status(PowerStatus::Running));
        app.tick(LinkState::Connected, &t);

        let p = StatsPayload::parse(
            r#"{"memory_bytes":1048576,"cpu_absolute":12.5,"disk_bytes":0,"network":{"rx_bytes":0,"tx_bytes":0}}"#,
        )
        .unwrap();
        app.bus().publish(ServerEvent::Stats(p));
        app.bus().publish(ServerEvent::Status(PowerStatus::Offline));
        app.tick(LinkState::Connected, &t);

        assert_eq!(app.status(), Some(PowerStatus::Offline));
        assert!(app.stats.cpu.is_cleared());
        assert_eq!(app.stats.cpu.latest(0), None);
        assert_eq!(app.stats.current().cpu, 0.0);
    }

    #[test]
    fn install_locks_power_keys_until_completed() {
        let (mut app, _d) = app();
        let t = MemoryTransport::new();
        app.bus().publish(ServerEvent::Status(PowerStatus::Offline));
        app.bus().publish(ServerEvent::InstallStarted);
        app.tick(LinkState::Connected, &t);
        let view = app.view(LinkState::Connected);
        assert!(view.installing);
        assert!(view.lock_notice().is_some());
        app.handle_key(key(KeyCode::F(1)), &view, &t);
        assert!(!t.sent().contains(&OutboundRequest::SetState(PowerAction::Start)));

        app.bus().publish(ServerEvent::InstallCompleted);
        app.tick(LinkState::Connected, &t);
        let view = app.view(LinkState::Connected);
        assert_eq!(view.lock_notice(), None);
        app.handle_key(key(KeyCode::F(1)), &view, &t);
        assert!(t.sent().contains(&OutboundRequest::SetState(PowerAction::Start)));
    }

    #[test]
    fn transfer_flag_follows_transfer_events() {
        let (mut app, _d) = app();
        let t = MemoryTransport::new();
        app.bus().publish(ServerEvent::TransferLogs("archiving".into()));
        app.tick(LinkState::Connected, &t);
        assert!(app.view(LinkState::Connected).transferring);
        app.bus()
            .publish(ServerEvent::TransferStatus(TransferStatus::Failure));
        app.tick(LinkState::Connected, &t);
        assert!(!app.view(LinkState::Connected).transferring);
    }

    #[test]
    fn kill_needs_confirmation() {
        let (mut app, _d) = app();
        let t = MemoryTransport::new();
        app.bus().publish(ServerEvent::Status(PowerStatus::Stopping));
        app.tick(LinkState::Connected, &t);
        let view = app.view(LinkState::Connected);

        app.handle_key(key(KeyCode::F(3)), &view, &t);
        assert!(app.power.confirming_kill());
        // typing while the dialog is open does not reach the console
        app.handle_key(key(KeyCode::Char('x')), &view, &t);
        assert_eq!(app.console.input(), "");

        app.handle_key(key(KeyCode::Char('y')), &view, &t);
        assert!(t
            .sent()
            .contains(&OutboundRequest::SetState(PowerAction::Kill)));
    }

    #[test]
    fn typed_command_is_sent_and_remembered() {
        let (mut app, _d) = app();
        let t = MemoryTransport::new();
        app.bus().publish(ServerEvent::Status(PowerStatus::Running));
        app.tick(LinkState::Connected, &t);
        let view = app.view(LinkState::Connected);
        for c in "say hi".chars() {
            app.handle_key(key(KeyCode::Char(c)), &view, &t);
        }
        app.handle_key(key(KeyCode::Enter), &view, &t);
        assert!(t
            .sent()
            .contains(&OutboundRequest::SendCommand("say hi".into())));
        assert_eq!(app.console.history().get(0), Some("say hi"));
    }

    #[test]
    fn ctrl_c_quits() {
        let (mut app, _d) = app();
        let t = MemoryTransport::new();
        let view = app.view(LinkState::Connecting);
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), &view, &t);
        assert!(app.should_quit());
    }

    #[test]
    fn rejected_link_has_no_session() {
        let (app, _d) = app();
        let view = app.view(LinkState::Rejected);
        assert!(!view.connection.has_session);
        assert!(!view.connection.usable());
    }

    #[test]
    fn draws_without_panicking() {
        let (mut app, _d) = app();
        let t = MemoryTransport::new();
        app.tick(LinkState::Connected, &t);
        app.bus().publish(ServerEvent::ConsoleOutput("\u{1b}[32mDone\u{1b}[0m".into()));
        app.tick(LinkState::Connected, &t);
        assert_eq!(app.console.lines().len(), 1);
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| app.draw(f, LinkState::Connected)).unwrap();
    }
}
