//! Console scrollback and command input.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::ansi::parse_line;
use crate::console::{ConsoleLine, ConsoleSession, ConsoleState, LineKind, PRELUDE};
use crate::ui::theme::{self, ACCENT, DISABLED, MUTED};

pub fn render_line(line: &ConsoleLine) -> Line<'static> {
    let prelude = || Span::styled(PRELUDE, theme::PRELUDE);
    match line.kind {
        LineKind::Output => parse_line(&line.text, Style::default()),
        LineKind::Daemon => {
            let mut l = parse_line(&line.text, Style::default());
            l.spans.insert(0, prelude());
            l
        }
        LineKind::DaemonError => Line::from(vec![
            prelude(),
            Span::styled(format!(" {} ", line.text), theme::DAEMON_ERROR),
        ]),
        LineKind::Status => {
            // "Server marked as <state>..."
            let state = line
                .text
                .strip_prefix("Server marked as ")
                .and_then(|s| s.strip_suffix("..."))
                .unwrap_or(&line.text);
            Line::from(vec![
                prelude(),
                Span::styled("Server marked as ", theme::STATUS_TEXT),
                Span::styled(state.to_string(), theme::STATUS_VALUE),
                Span::styled("...", theme::STATUS_TEXT),
            ])
        }
        LineKind::TransferFailed => Line::from(vec![
            prelude(),
            Span::styled(line.text.clone(), theme::TRANSFER_FAILED),
        ]),
    }
}

/// The `height` lines ending `scroll` lines above the bottom, with the search
/// hit highlighted.
pub fn visible_lines(console: &ConsoleSession, height: usize) -> Vec<Line<'static>> {
    let total = console.lines().len();
    let end = total.saturating_sub(console.scroll());
    let start = end.saturating_sub(height);
    let hit = console.search().and_then(|s| s.hit);
    (start..end)
        .zip(console.lines().range(start..end))
        .map(|(i, l)| {
            let line = render_line(l);
            if hit == Some(i) {
                line.patch_style(theme::SEARCH_HIT)
            } else {
                line
            }
        })
        .collect()
}

fn pane_title(console: &ConsoleSession) -> String {
    match (console.state(), console.scroll()) {
        (ConsoleState::Connected, 0) => "Console".to_string(),
        (ConsoleState::Connected, n) => format!("Console (scrolled {n} up, End to follow)"),
        (ConsoleState::Connecting, _) => "Console — connecting...".to_string(),
        (ConsoleState::Disconnected, _) => "Console — disconnected".to_string(),
    }
}

pub fn draw_console(f: &mut ratatui::Frame<'_>, area: Rect, console: &ConsoleSession, input_enabled: bool) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    let title = match console.search() {
        Some(s) if !s.editing => format!(
            "Console search: {} (n older, N newer, Esc close){}",
            s.query,
            if s.hit.is_none() { " no match" } else { "" }
        ),
        _ => pane_title(console),
    };

    let lines = visible_lines(console, parts[0].height.saturating_sub(2) as usize);
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title)),
        parts[0],
    );

    if let Some(search) = console.search() {
        let input = Paragraph::new(Line::from(vec![
            Span::styled("/ ", Style::default().fg(ACCENT)),
            Span::raw(search.query.clone()),
        ]))
        .block(Block::default().borders(Borders::ALL).title("Search (Enter to find, Esc to close)"));
        f.render_widget(input, parts[1]);
        if search.editing {
            let x = parts[1].x + 3 + search.query.chars().count() as u16;
            let x = x.min(parts[1].right().saturating_sub(2));
            f.set_cursor_position((x, parts[1].y + 1));
        }
        return;
    }

    let (prompt_color, body) = if !input_enabled {
        (DISABLED, Span::styled("console unavailable", Style::default().fg(DISABLED)))
    } else if console.input().is_empty() {
        (ACCENT, Span::styled("Type a command...", Style::default().fg(MUTED)))
    } else {
        (ACCENT, Span::raw(console.input().to_string()))
    };
    let input = Paragraph::new(Line::from(vec![
        Span::styled("» ", Style::default().fg(prompt_color)),
        body,
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(input, parts[1]);

    if input_enabled {
        let x = parts[1].x + 3 + console.input().chars().count() as u16;
        let x = x.min(parts[1].right().saturating_sub(2));
        f.set_cursor_position((x, parts[1].y + 1));
    }
}
