//! Power button footer and the kill confirmation dialog.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use crate::power::{PowerButton, PowerControls};
use crate::types::{PowerAction, PowerStatus};
use crate::ui::theme::{ACCENT, DANGER, DISABLED, MUTED, OK, WARN};

fn button(key: &str, label: &str, enabled: bool, color: ratatui::style::Color) -> Vec<Span<'static>> {
    let style = if enabled {
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(DISABLED)
    };
    vec![
        Span::styled(format!("[{key}] {label}"), style),
        Span::raw("  "),
    ]
}

/// `notice` replaces the key hints and disables every button.
pub fn draw_power_bar(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    status: Option<PowerStatus>,
    notice: Option<&str>,
) {
    let kill = PowerControls::stop_action(status) == PowerAction::Kill;
    let on = |b| notice.is_none() && PowerControls::enabled(b, status);
    let mut spans = Vec::new();
    spans.extend(button("F1", "Start", on(PowerButton::Start), OK));
    spans.extend(button("F2", "Restart", on(PowerButton::Restart), ACCENT));
    spans.extend(button(
        "F3",
        if kill { "Kill" } else { "Stop" },
        on(PowerButton::Stop),
        if kill { DANGER } else { WARN },
    ));
    match notice {
        Some(text) => spans.push(Span::styled(
            format!("⚠ {text}"),
            Style::default().fg(WARN).add_modifier(Modifier::BOLD),
        )),
        None => spans.push(Span::styled(
            "↑/↓ history  PgUp/PgDn scroll  Ctrl-F search",
            Style::default().fg(MUTED),
        )),
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let v = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(height),
            Constraint::Fill(1),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(width),
            Constraint::Fill(1),
        ])
        .split(v[1])[1]
}

pub fn draw_kill_dialog(f: &mut ratatui::Frame<'_>, area: Rect) {
    let rect = centered(area, 56.min(area.width), 7.min(area.height));
    let text = vec![
        Line::from("Forcibly stopping a server can lead to data corruption."),
        Line::from("Only use this if the server is unresponsive."),
        Line::from(""),
        Line::from(vec![
            Span::styled("[y] Kill Process", Style::default().fg(DANGER).add_modifier(Modifier::BOLD)),
            Span::raw("   "),
            Span::styled("[n] Cancel", Style::default().fg(MUTED)),
        ]),
    ];
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(text).wrap(Wrap { trim: true }).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(DANGER))
                .title("Forcibly Stop Process"),
        ),
        rect,
    );
}
