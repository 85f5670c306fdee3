//! Turns highlighter spans into numbered ratatui lines.

use crate::highlight::{highlight, StyleClass};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

pub fn style_for(class: StyleClass) -> Style {
    let s = Style::default();
    match class {
        StyleClass::Plain => s,
        StyleClass::Keyword => s.fg(Color::Magenta).add_modifier(Modifier::BOLD),
        StyleClass::Identifier => s.fg(Color::White),
        StyleClass::Boolean => s.fg(Color::LightYellow),
        StyleClass::Type => s.fg(Color::Cyan),
        StyleClass::Number => s.fg(Color::LightBlue),
        StyleClass::Comment => s.fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        StyleClass::String => s.fg(Color::Green),
        StyleClass::Char => s.fg(Color::LightGreen),
        StyleClass::Symbol => s.fg(Color::Yellow),
        StyleClass::Error => s.fg(Color::Red).add_modifier(Modifier::UNDERLINED),
    }
}

/// Highlight `text` and split it into display lines with a line-number gutter.
pub fn source_lines(text: &str) -> Vec<Line<'static>> {
    let mut rows: Vec<Vec<Span<'static>>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();

    for span in highlight(text) {
        let style = style_for(span.style);
        let mut parts = span.text.split('\n').peekable();
        while let Some(part) = parts.next() {
            let more = parts.peek().is_some();
            let part = if more {
                part.strip_suffix('\r').unwrap_or(part)
            } else {
                part
            };
            if !part.is_empty() {
                current.push(Span::styled(part.replace('\t', "    "), style));
            }
            if more {
                rows.push(std::mem::take(&mut current));
            }
        }
    }
    rows.push(current);

    let width = rows.len().to_string().len();
    let gutter = Style::default().fg(Color::DarkGray);
    rows.into_iter()
        .enumerate()
        .map(|(i, spans)| {
            let mut line = vec![Span::styled(format!("{:>width$} │ ", i + 1), gutter)];
            line.extend(spans);
            Line::from(line)
        })
        .collect()
}
