//! ANSI SGR parsing of console output into styled ratatui spans.
//!
//! Only colour and text attributes are honoured. Cursor movement, OSC and
//! other control sequences are dropped so escape bytes never reach the screen.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use vte::{Params, Parser, Perform};

struct SpanBuilder {
    style: Style,
    text: String,
    spans: Vec<Span<'static>>,
}

impl SpanBuilder {
    fn new(base: Style) -> Self {
        Self {
            style: base,
            text: String::new(),
            spans: Vec::new(),
        }
    }

    fn flush(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.spans.push(Span::styled(text, self.style));
        }
    }

    fn set_style(&mut self, style: Style) {
        if style != self.style {
            self.flush();
            self.style = style;
        }
    }
}

fn basic(n: u16) -> Color {
    match n {
        0 => Color::Black,
        1 => Color::Red,
        2 => Color::Green,
        3 => Color::Yellow,
        4 => Color::Blue,
        5 => Color::Magenta,
        6 => Color::Cyan,
        _ => Color::Gray,
    }
}

fn bright(n: u16) -> Color {
    match n {
        0 => Color::DarkGray,
        1 => Color::LightRed,
        2 => Color::LightGreen,
        3 => Color::LightYellow,
        4 => Color::LightBlue,
        5 => Color::LightMagenta,
        6 => Color::LightCyan,
        _ => Color::White,
    }
}

// Parses `5;n` or `2;r;g;b` after a 38/48 code, consuming from `it`.
fn extended<'a>(it: &mut impl Iterator<Item = &'a [u16]>) -> Option<Color> {
    match *it.next()?.first()? {
        5 => Some(Color::Indexed(*it.next()?.first()? as u8)),
        2 => {
            let r = *it.next()?.first()? as u8;
            let g = *it.next()?.first()? as u8;
            let b = *it.next()?.first()? as u8;
            Some(Color::Rgb(r, g, b))
        }
        _ => None,
    }
}

fn apply_sgr(mut style: Style, base: Style, params: &Params) -> Style {
    let mut it = params.iter();
    // `ESC[m` with no params is a reset
    if params.is_empty() {
        return base;
    }
    while let Some(p) = it.next() {
        let code = p.first().copied().unwrap_or(0);
        style = match code {
            0 => base,
            1 => style.add_modifier(Modifier::BOLD),
            2 => style.add_modifier(Modifier::DIM),
            3 => style.add_modifier(Modifier::ITALIC),
            4 => style.add_modifier(Modifier::UNDERLINED),
            7 => style.add_modifier(Modifier::REVERSED),
            22 => style.remove_modifier(Modifier::BOLD | Modifier::DIM),
            23 => style.remove_modifier(Modifier::ITALIC),
            24 => style.remove_modifier(Modifier::UNDERLINED),
            27 => style.remove_modifier(Modifier::REVERSED),
            30..=37 => style.fg(basic(code - 30)),
            39 => style.fg(base.fg.unwrap_or(Color::Reset)),
            40..=47 => style.bg(basic(code - 40)),
            49 => style.bg(base.bg.unwrap_or(Color::Reset)),
            90..=97 => style.fg(bright(code - 90)),
            100..=107 => style.bg(bright(code - 100)),
            38 => match extended(&mut it) {
                Some(c) => style.fg(c),
                None => style,
            },
            48 => match extended(&mut it) {
                Some(c) => style.bg(c),
                None => style,
            },
            _ => style,
        };
    }
    style
}

struct Performer<'a> {
    base: Style,
    out: &'a mut SpanBuilder,
}

impl Perform for Performer<'_> {
    fn print(&mut self, c: char) {
        self.out.text.push(c);
    }

    fn execute(&mut self, byte: u8) {
        if byte == b'\t' {
            self.out.text.push_str("    ");
        }
    }

    fn csi_dispatch(&mut self, params: &Params, _intermediates: &[u8], _ignore: bool, action: char) {
        if action == 'm' {
            let style = apply_sgr(self.out.style, self.base, params);
            self.out.set_style(style);
        }
    }
}

/// Parse one line of console output. Styles carry over within the line only.
pub fn parse_line(input: &str, base: Style) -> Line<'static> {
    let mut parser = Parser::new();
    let mut out = SpanBuilder::new(base);
    {
        let mut perf = Performer {
            base,
            out: &mut out,
        };
        for byte in input.bytes() {
            parser.advance(&mut perf, byte);
        }
    }
    out.flush();
    Line::from(out.spans)
}

/// Text of a line with all styling removed.
pub fn plain(line: &Line<'_>) -> String {
    line.spans.iter().map(|s| s.content.as_ref()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_one_span() {
        let l = parse_line("hello world", Style::default());
        assert_eq!(l.spans.len(), 1);
        assert_eq!(plain(&l), "hello world");
    }

    #[test]
    fn colours_split_spans_and_escapes_are_stripped() {
        let l = parse_line("\u{1b}[31mred\u{1b}[0m plain", Style::default());
        assert_eq!(plain(&l), "red plain");
        assert_eq!(l.spans[0].style.fg, Some(Color::Red));
        assert_eq!(l.spans[1].style, Style::default());
    }

    #[test]
    fn indexed_and_rgb_colours() {
        let l = parse_line("\u{1b}[38;5;87mA\u{1b}[48;2;1;2;3mB", Style::default());
        assert_eq!(l.spans[0].style.fg, Some(Color::Indexed(87)));
        assert_eq!(l.spans[1].style.bg, Some(Color::Rgb(1, 2, 3)));
        assert_eq!(plain(&l), "AB");
    }

    #[test]
    fn bold_and_cursor_sequences() {
        let l = parse_line("\u{1b}[1mB\u{1b}[2K\u{1b}[22mn", Style::default());
        assert!(l.spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert!(!l.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(plain(&l), "Bn");
    }

    #[test]
    fn utf8_survives() {
        let l = parse_line("héllo → ✓", Style::default());
        assert_eq!(plain(&l), "héllo → ✓");
    }
}
