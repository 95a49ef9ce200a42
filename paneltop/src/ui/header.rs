//! Top header with server key, power status and connection indicator.

use chrono::{DateTime, Local};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders},
};

use crate::types::PowerStatus;
use crate::ui::theme::{DANGER, MUTED, OK, WARN};
use crate::ws::LinkState;

pub fn status_span(status: Option<PowerStatus>) -> Span<'static> {
    let (text, color) = match status {
        Some(PowerStatus::Running) => ("running", OK),
        Some(PowerStatus::Starting) => ("starting", WARN),
        Some(PowerStatus::Stopping) => ("stopping", WARN),
        Some(PowerStatus::Offline) | None => ("offline", DANGER),
    };
    Span::styled(text, Style::default().fg(color))
}

fn link_span(link: LinkState) -> Span<'static> {
    match link {
        LinkState::Connected => Span::styled("connected", Style::default().fg(OK)),
        LinkState::Connecting => Span::styled("connecting...", Style::default().fg(WARN)),
        LinkState::Disconnected => Span::styled("reconnecting...", Style::default().fg(WARN)),
        LinkState::Rejected => Span::styled("token rejected", Style::default().fg(DANGER)),
    }
}

pub fn draw_header(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    server: &str,
    status: Option<PowerStatus>,
    link: LinkState,
    updated_at: Option<DateTime<Local>>,
) {
    let mut spans = vec![
        Span::raw(format!("paneltop — server: {server} | ")),
        status_span(status),
        Span::raw(" | "),
        link_span(link),
    ];
    if let Some(at) = updated_at {
        spans.push(Span::styled(
            format!(" | updated {}", at.format("%H:%M:%S")),
            Style::default().fg(MUTED),
        ));
    }
    spans.push(Span::styled("  (Ctrl-C to quit)", Style::default().fg(MUTED)));
    let title = Line::from(spans);
    f.render_widget(Block::default().title(title).borders(Borders::BOTTOM), area);
}
