//! Convert console lines with SGR color codes into styled ratatui lines.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

const ESC: char = '\x1b';

/// Split `text` at SGR sequences and style each run.
///
/// Unknown parameters are ignored; sequences other than SGR are dropped.
pub fn to_line(text: &str) -> Line<'static> {
    let mut spans = Vec::new();
    let mut style = Style::default();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != ESC {
            current.push(ch);
            continue;
        }
        if chars.peek() != Some(&'[') {
            continue;
        }
        chars.next();
        let mut params = String::new();
        let mut terminator = None;
        for next in chars.by_ref() {
            if next.is_ascii_digit() || next == ';' {
                params.push(next);
            } else {
                terminator = Some(next);
                break;
            }
        }
        if terminator != Some('m') {
            continue;
        }
        if !current.is_empty() {
            spans.push(Span::styled(std::mem::take(&mut current), style));
        }
        style = apply_sgr(style, &params);
    }
    if !current.is_empty() || spans.is_empty() {
        spans.push(Span::styled(current, style));
    }
    Line::from(spans)
}

fn apply_sgr(mut style: Style, params: &str) -> Style {
    if params.is_empty() {
        return Style::default();
    }
    for code in params.split(';') {
        style = match code.parse::<u8>() {
            Ok(0) => Style::default(),
            Ok(1) => style.add_modifier(Modifier::BOLD),
            Ok(2) => style.add_modifier(Modifier::DIM),
            Ok(22) => style.remove_modifier(Modifier::BOLD | Modifier::DIM),
            Ok(code @ 30..=37) => style.fg(basic_color(code - 30)),
            Ok(39) => style.fg(Color::Reset),
            _ => style,
        };
    }
    style
}

fn basic_color(index: u8) -> Color {
    match index {
        0 => Color::Black,
        1 => Color::Red,
        2 => Color::Green,
        3 => Color::Yellow,
        4 => Color::Blue,
        5 => Color::Magenta,
        6 => Color::Cyan,
        _ => Color::White,
    }
}
