use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const KEYS: &[(&str, &str)] = &[
    ("r / F5", "Reload FILE and run"),
    ("s / Esc", "Stop the running process"),
    ("m", "Switch Java / Kotlin (idle only)"),
    ("↑/↓ j/k", "Scroll source"),
    ("PgUp/PgDn", "Scroll console"),
    ("y", "Copy console output to clipboard"),
    ("?", "Toggle this help"),
    ("q / Ctrl-C", "Quit"),
];

pub fn draw_help(area: Rect, f: &mut Frame) {
    let mut lines = vec![Line::from("Keybinds:")];
    for (key, action) in KEYS {
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(format!("{key:<12}"), Style::default().fg(Color::Magenta)),
            Span::raw(*action),
        ]));
    }
    if let Some(path) = crate::logging::log_file_path() {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::raw("Log: "),
            Span::styled(path.display().to_string(), Style::default().fg(Color::Cyan)),
        ]));
    }

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(Clear, area);
    f.render_widget(p, area);
}
