//! Shared UI theme constants.

use ratatui::style::{Color, Modifier, Style};

use crate::details::Severity;

pub const ACCENT: Color = crate::chart::ACCENT;
pub const MUTED: Color = Color::Rgb(115, 115, 125);
pub const DISABLED: Color = Color::Rgb(70, 70, 80);
pub const OK: Color = Color::Rgb(0x34, 0xd3, 0x99);
pub const WARN: Color = Color::Rgb(0xfb, 0xbf, 0x24);
pub const DANGER: Color = Color::Rgb(0xf8, 0x71, 0x71);

// Console line styles
pub const PRELUDE: Style = Style::new().fg(Color::Indexed(87)).add_modifier(Modifier::BOLD);
pub const DAEMON_ERROR: Style = Style::new()
    .fg(Color::Indexed(255))
    .bg(Color::Indexed(196))
    .add_modifier(Modifier::BOLD);
pub const STATUS_TEXT: Style = Style::new().fg(Color::Indexed(245));
pub const STATUS_VALUE: Style = Style::new().fg(Color::Indexed(87));
pub const TRANSFER_FAILED: Style = Style::new().fg(Color::Indexed(196));
pub const SEARCH_HIT: Style = Style::new().add_modifier(Modifier::REVERSED);

pub fn severity_color(s: Severity) -> Color {
    match s {
        Severity::Normal => MUTED,
        Severity::Warning => WARN,
        Severity::Critical => DANGER,
    }
}
