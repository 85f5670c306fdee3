mod help;
mod source_view;
mod state;

use crate::cli::Cli;
use crate::console::Snapshot;
use crate::model::{RunEvent, RunState};
use crate::orchestrator::{self, Orchestrator, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};
use state::UiState;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli) -> Result<i32> {
    let source = match args.file.as_deref() {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => crate::cli::TEMPLATE.to_string(),
    };

    let (orch, event_rx) = Orchestrator::new(crate::cli::build_config(&args));
    let mode = args.resolve_mode();
    if mode != orch.mode() {
        orch.select_mode(mode);
    }
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_state = UiState::new(args.file.clone(), source);
    let ui_orch = orch.clone();
    let ui_handle =
        std::thread::spawn(move || run_threaded(ui_state, ui_orch, event_rx, cmd_tx));

    let res = orchestrator::run_controller(orch, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res.map(|()| 0)
}

/// Run the TUI loop on a dedicated thread.
///
/// `orch` is only read here (state, mode); every action goes through `cmd_tx`.
fn run_threaded(
    mut state: UiState,
    orch: Orchestrator,
    mut event_rx: UnboundedReceiver<RunEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();
    let mut console_page: i32 = 10;

    let res = loop {
        while let Ok(ev) = event_rx.try_recv() {
            state.apply(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            let snap = orch.snapshot();
            terminal
                .draw(|f| {
                    console_page = draw(f.area(), f, &state, &snap);
                })
                .ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char('r')) | (_, KeyCode::F(5)) => {
                        match state.reload_source() {
                            Ok(()) => {
                                let _ = cmd_tx.send(UiCommand::Run {
                                    text: state.source.clone(),
                                });
                            }
                            Err(e) => state.info = format!("Reload failed: {e:#}"),
                        }
                    }
                    (_, KeyCode::Char('s')) | (_, KeyCode::Esc) => {
                        let _ = cmd_tx.send(UiCommand::Stop);
                    }
                    (_, KeyCode::Char('m')) => {
                        let _ = cmd_tx.send(UiCommand::ToggleMode);
                    }
                    (_, KeyCode::Char('y')) => {
                        let text = state.console.join("\n");
                        state.info = match copy_to_clipboard(&text) {
                            Ok(()) => format!("✓ Copied {} line(s) to clipboard", state.console.len()),
                            Err(e) => format!("Clipboard copy failed: {e:#}"),
                        };
                    }
                    (_, KeyCode::Char('?')) => state.show_help = !state.show_help,
                    (_, KeyCode::Up) | (_, KeyCode::Char('k')) => state.scroll_source(-1),
                    (_, KeyCode::Down) | (_, KeyCode::Char('j')) => state.scroll_source(1),
                    (_, KeyCode::PageUp) => state.scroll_console(console_page),
                    (_, KeyCode::PageDown) => state.scroll_console(-console_page),
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

/// Render one frame; returns the console height so paging can match it.
fn draw(
    area: Rect,
    f: &mut ratatui::Frame,
    state: &UiState,
    snap: &Snapshot,
) -> i32 {
    let mode = snap.mode;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(area);

    let title = match state.source_path.as_ref() {
        Some(p) => format!("{} ({mode})", p.display()),
        None => format!("scratch ({mode})"),
    };
    let source = Paragraph::new(source_view::source_lines(&state.source))
        .scroll((state.source_scroll, 0))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(source, rows[0]);

    let height = rows[1].height.saturating_sub(2) as usize;
    let offset = state.console_offset(height);
    let lines: Vec<Line> = state
        .console
        .iter()
        .skip(offset)
        .take(height)
        .map(|l| Line::from(l.as_str()))
        .collect();
    let state_color = match snap.state {
        RunState::Idle => Color::Green,
        RunState::Compiling | RunState::Running => Color::Yellow,
        RunState::Stopping => Color::Red,
    };
    let mut status = format!("[{:?}]", snap.state);
    if let Some(active) = snap.active.as_ref() {
        status.push_str(&format!(" {} {}", active.phase, active.program));
        if let Some(pid) = active.pid {
            status.push_str(&format!(" (pid {pid})"));
        }
    }
    let console_title = Line::from(vec![
        Span::raw("Console "),
        Span::styled(status, Style::default().fg(state_color)),
    ]);
    let console = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(console_title));
    f.render_widget(console, rows[1]);

    let status = Paragraph::new(Line::from(vec![
        Span::styled(" r", Style::default().fg(Color::Magenta)),
        Span::raw(" run  "),
        Span::styled("s", Style::default().fg(Color::Magenta)),
        Span::raw(" stop  "),
        Span::styled("m", Style::default().fg(Color::Magenta)),
        Span::raw(" mode  "),
        Span::styled("?", Style::default().fg(Color::Magenta)),
        Span::raw(" help  │ "),
        Span::raw(state.info.as_str()),
    ]));
    f.render_widget(status, rows[2]);

    if state.show_help {
        help::draw_help(centered(area, 60, 14), f);
    }

    height.max(1) as i32
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}

// Global clipboard manager channel - initialized once on first use
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;

static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Start the clipboard thread on first use.
///
/// Each copy keeps its `Clipboard` alive for a while; on Linux the contents
/// vanish with the owning instance before managers can read them otherwise.
fn init_clipboard_manager() -> &'static std_mpsc::Sender<String> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                match Clipboard::new() {
                    Ok(mut clipboard) => {
                        if clipboard.set_text(&text).is_ok() {
                            std::thread::sleep(Duration::from_secs(2));
                        }
                    }
                    Err(e) => tracing::warn!("clipboard unavailable: {e}"),
                }
            }
        });

        tx
    })
}

/// Queue `text` for the clipboard thread; returns without waiting.
fn copy_to_clipboard(text: &str) -> Result<()> {
    init_clipboard_manager()
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))
}
