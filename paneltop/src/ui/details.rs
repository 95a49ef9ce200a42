//! Row of stat blocks (address, uptime, cpu, memory, disk, network).

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::details::{Severity, StatBlock};
use crate::ui::theme::{severity_color, MUTED};
use crate::ui::util::truncate_middle;

fn draw_block(f: &mut ratatui::Frame<'_>, area: Rect, b: &StatBlock) {
    let border = Style::default().fg(severity_color(b.severity));
    let value_style = match b.severity {
        Severity::Normal => Style::default(),
        s => Style::default().fg(severity_color(s)),
    }
    .add_modifier(Modifier::BOLD);

    let width = area.width.saturating_sub(2) as usize;
    let mut spans = vec![Span::styled(truncate_middle(&b.value, width), value_style)];
    if let Some(limit) = &b.limit {
        spans.push(Span::styled(format!(" {limit}"), Style::default().fg(MUTED)));
    }
    let p = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(b.title),
    );
    f.render_widget(p, area);
}

pub fn draw_details(f: &mut ratatui::Frame<'_>, area: Rect, blocks: &[StatBlock]) {
    if blocks.is_empty() {
        return;
    }
    let n = blocks.len() as u32;
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints((0..n).map(|_| Constraint::Ratio(1, n)))
        .split(area);
    for (b, rect) in blocks.iter().zip(cols.iter()) {
        draw_block(f, *rect, b);
    }
}
