//! Console session: scrollback fed by the output events, and the command
//! input line with history recall.

use std::collections::VecDeque;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::style::Style;

use crate::ansi::{parse_line, plain};
use crate::events::{EventBus, Subscription};
use crate::history::{push_capped, CommandHistory};
use crate::session::{SessionView, Transport};
use crate::store::{history_key, KeyedStore};
use crate::types::{EventKind, OutboundRequest, ServerEvent, TransferStatus};

pub const SCROLLBACK: usize = 5000;

pub const PRELUDE: &str = "container@pterodactyl ~ ";

const SUBSCRIBED: [EventKind; 7] = [
    EventKind::ConsoleOutput,
    EventKind::InstallOutput,
    EventKind::TransferLogs,
    EventKind::TransferStatus,
    EventKind::DaemonMessage,
    EventKind::DaemonError,
    EventKind::Status,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Server or installer output, may carry ANSI colours.
    Output,
    /// Message from the daemon itself, shown after the prelude.
    Daemon,
    DaemonError,
    /// Power state change notice.
    Status,
    TransferFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    pub kind: LineKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Scrollback search opened with Ctrl-F.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Search {
    pub query: String,
    /// Typing the query; once Enter is pressed `n`/`N` step between matches.
    pub editing: bool,
    /// Index into the scrollback of the highlighted match.
    pub hit: Option<usize>,
}

// Drop one trailing line break the daemon leaves on each line
fn trim_eol(s: &str) -> &str {
    s.strip_suffix("\r\n")
        .or_else(|| s.strip_suffix('\n'))
        .or_else(|| s.strip_suffix('\r'))
        .unwrap_or(s)
}

pub struct ConsoleSession {
    lines: VecDeque<ConsoleLine>,
    input: String,
    cursor: Option<usize>,
    history: CommandHistory,
    server_key: String,
    state: ConsoleState,
    scroll: usize,
    search: Option<Search>,
    subscription: Option<Subscription>,
}

impl ConsoleSession {
    pub fn new(server_key: &str, history: CommandHistory) -> Self {
        Self {
            lines: VecDeque::with_capacity(256),
            input: String::new(),
            cursor: None,
            history,
            server_key: server_key.to_string(),
            state: ConsoleState::Disconnected,
            scroll: 0,
            search: None,
            subscription: None,
        }
    }

    /// Load this server's command history from `store`.
    pub fn restore(server_key: &str, store: &KeyedStore) -> Self {
        let entries: Vec<String> = store.get(&history_key(server_key)).unwrap_or_default();
        Self::new(server_key, CommandHistory::from_entries(entries))
    }

    pub fn state(&self) -> ConsoleState {
        self.state
    }

    pub fn lines(&self) -> &VecDeque<ConsoleLine> {
        &self.lines
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Lines scrolled up from the bottom.
    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn search(&self) -> Option<&Search> {
        self.search.as_ref()
    }

    pub fn input_enabled(&self, view: &SessionView) -> bool {
        self.state == ConsoleState::Connected && view.connection.usable()
    }

    pub fn begin_connecting(&mut self) {
        if self.state == ConsoleState::Disconnected {
            self.state = ConsoleState::Connecting;
        }
    }

    /// Socket is up: reset the view (unless a transfer is running), listen to
    /// output and ask the daemon for its log backlog.
    pub fn on_connected(&mut self, bus: &EventBus, view: &SessionView, transport: &dyn Transport) {
        if !view.transferring {
            self.lines.clear();
            self.scroll = 0;
            if let Some(search) = self.search.as_mut() {
                search.hit = None;
            }
        }
        self.subscription = Some(bus.subscribe(&SUBSCRIBED));
        self.state = ConsoleState::Connected;
        if let Err(e) = transport.send(OutboundRequest::SendLogs) {
            tracing::debug!(error = %e, "log backlog request not sent");
        }
    }

    pub fn on_disconnected(&mut self) {
        self.subscription = None;
        self.state = ConsoleState::Disconnected;
    }

    /// Follow connection changes and apply queued events. Run once per tick.
    pub fn sync(&mut self, bus: &EventBus, view: &SessionView, transport: &dyn Transport) {
        match (self.state, view.connection.usable()) {
            (ConsoleState::Connected, false) => self.on_disconnected(),
            (ConsoleState::Disconnected | ConsoleState::Connecting, true) => {
                self.on_connected(bus, view, transport)
            }
            (ConsoleState::Disconnected, false) if view.connection.has_session => {
                self.begin_connecting()
            }
            _ => {}
        }

        let events = match self.subscription.as_mut() {
            Some(sub) => sub.drain(),
            None => return,
        };
        for ev in events {
            self.handle_event(ev);
        }
    }

    pub fn handle_event(&mut self, ev: ServerEvent) {
        let line = match ev {
            ServerEvent::ConsoleOutput(s)
            | ServerEvent::InstallOutput(s)
            | ServerEvent::TransferLogs(s) => ConsoleLine {
                kind: LineKind::Output,
                text: trim_eol(&s).to_string(),
            },
            ServerEvent::DaemonMessage(s) => ConsoleLine {
                kind: LineKind::Daemon,
                text: trim_eol(&s).to_string(),
            },
            ServerEvent::DaemonError(s) => ConsoleLine {
                kind: LineKind::DaemonError,
                text: trim_eol(&s).to_string(),
            },
            ServerEvent::Status(st) => ConsoleLine {
                kind: LineKind::Status,
                text: format!("Server marked as {}...", st.as_str()),
            },
            ServerEvent::TransferStatus(TransferStatus::Failure) => ConsoleLine {
                kind: LineKind::TransferFailed,
                text: "Transfer has failed.".into(),
            },
            _ => return,
        };
        self.push_line(line);
    }

    fn push_line(&mut self, line: ConsoleLine) {
        let evicts = self.lines.len() >= SCROLLBACK;
        push_capped(&mut self.lines, line, SCROLLBACK);
        if evicts {
            if let Some(search) = self.search.as_mut() {
                search.hit = search.hit.and_then(|i| i.checked_sub(1));
            }
        }
        // Keep the viewport anchored while the user is scrolled up
        if self.scroll > 0 {
            self.scroll = (self.scroll + 1).min(self.max_scroll());
        }
    }

    // The oldest line stays on screen
    fn max_scroll(&self) -> usize {
        self.lines.len().saturating_sub(1)
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.scroll = (self.scroll + n).min(self.max_scroll());
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.scroll = self.scroll.saturating_sub(n);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = 0;
    }

    pub fn history_up(&mut self) {
        if self.history.is_empty() {
            self.cursor = None;
            self.input.clear();
            return;
        }
        let next = self.cursor.map_or(0, |c| c + 1).min(self.history.len() - 1);
        self.cursor = Some(next);
        self.input = self.history.get(next).unwrap_or_default().to_string();
    }

    pub fn history_down(&mut self) {
        self.cursor = match self.cursor {
            None | Some(0) => None,
            Some(c) => Some(c - 1),
        };
        self.input = self
            .cursor
            .and_then(|c| self.history.get(c))
            .unwrap_or_default()
            .to_string();
    }

    pub fn open_search(&mut self) {
        let search = self.search.get_or_insert_with(Search::default);
        search.editing = true;
    }

    pub fn close_search(&mut self) {
        self.search = None;
    }

    fn line_matches(line: &ConsoleLine, needle: &str) -> bool {
        plain(&parse_line(&line.text, Style::default()))
            .to_lowercase()
            .contains(needle)
    }

    /// Move to the closest match older than the current one, wrapping to the
    /// newest line. Returns false when nothing matches.
    pub fn find_previous(&mut self) -> bool {
        self.find(true)
    }

    /// Like [`find_previous`](Self::find_previous) but towards newer lines.
    pub fn find_next(&mut self) -> bool {
        self.find(false)
    }

    fn find(&mut self, backwards: bool) -> bool {
        let Some(search) = self.search.as_ref() else {
            return false;
        };
        let len = self.lines.len();
        if search.query.is_empty() || len == 0 {
            return false;
        }
        let needle = search.query.to_lowercase();
        // Start one step past the current hit; with no hit, from the bottom
        let from = match (search.hit, backwards) {
            (Some(i), true) => i + len - 1,
            (Some(i), false) => i + 1,
            (None, true) => len - 1,
            (None, false) => 0,
        };
        let found = (0..len)
            .map(|step| {
                if backwards {
                    (from + len - step) % len
                } else {
                    (from + step) % len
                }
            })
            .find(|&i| Self::line_matches(&self.lines[i], &needle));
        if let Some(search) = self.search.as_mut() {
            search.hit = found;
        }
        match found {
            Some(i) => {
                // Put the match on the bottom row of the viewport
                self.scroll = (len - 1 - i).min(self.max_scroll());
                true
            }
            None => false,
        }
    }

    fn handle_search_key(&mut self, k: KeyEvent) -> bool {
        let Some(search) = self.search.as_mut() else {
            return false;
        };
        let ctrl = k.modifiers.contains(KeyModifiers::CONTROL);
        match k.code {
            KeyCode::Esc => self.close_search(),
            KeyCode::Enter => {
                search.editing = false;
                self.find_previous();
            }
            KeyCode::Backspace if search.editing => {
                search.query.pop();
                search.hit = None;
            }
            KeyCode::Char('n') if !search.editing && !ctrl => {
                self.find_previous();
            }
            KeyCode::Char('N') if !search.editing && !ctrl => {
                self.find_next();
            }
            KeyCode::Char(c) if search.editing && !ctrl => {
                search.query.push(c);
                search.hit = None;
            }
            // Paging still moves the viewport; the command line stays untouched
            KeyCode::PageUp | KeyCode::PageDown | KeyCode::End => return false,
            _ => {}
        }
        true
    }

    /// Send the current input. Returns the command if one was submitted.
    pub fn submit(&mut self, transport: &dyn Transport, store: Option<&mut KeyedStore>) -> Option<String> {
        if self.input.is_empty() {
            return None;
        }
        let command = std::mem::take(&mut self.input);
        self.history.push(command.clone());
        self.cursor = None;
        self.scroll = 0;
        if let Err(e) = transport.send(OutboundRequest::SendCommand(command.clone())) {
            tracing::warn!(error = %e, "command not sent");
        }
        if let Some(store) = store {
            if let Err(e) = store.set(&history_key(&self.server_key), &self.history.to_vec()) {
                tracing::warn!(error = %e, "could not persist command history");
            }
        }
        Some(command)
    }

    /// Route a key press to the input line. Returns whether it was consumed.
    pub fn handle_key(
        &mut self,
        k: KeyEvent,
        view: &SessionView,
        transport: &dyn Transport,
        store: Option<&mut KeyedStore>,
    ) -> bool {
        if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('f') {
            self.open_search();
            return true;
        }
        if self.handle_search_key(k) {
            return true;
        }
        match k.code {
            KeyCode::PageUp => {
                self.scroll_up(10);
                return true;
            }
            KeyCode::PageDown => {
                self.scroll_down(10);
                return true;
            }
            KeyCode::End => {
                self.scroll_to_bottom();
                return true;
            }
            _ => {}
        }
        if !self.input_enabled(view) {
            return false;
        }
        match k.code {
            KeyCode::Up => self.history_up(),
            KeyCode::Down => self.history_down(),
            KeyCode::Enter => {
                self.submit(transport, store);
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) if !k.modifiers.contains(KeyModifiers::CONTROL) => {
                self.input.push(c)
            }
            _ => return false,
        }
        true
    }
}
