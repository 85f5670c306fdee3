use crate::model::RunEvent;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Console lines kept for display; older lines scroll away.
const MAX_CONSOLE_LINES: usize = 10_000;

pub struct UiState {
    pub source_path: Option<PathBuf>,
    pub source: String,
    pub source_scroll: u16,

    pub console: Vec<String>,
    /// Lines above the bottom of the console; 0 follows new output.
    pub console_back: usize,

    pub info: String,
    pub show_help: bool,
}

impl UiState {
    pub fn new(source_path: Option<PathBuf>, source: String) -> Self {
        Self {
            source_path,
            source,
            source_scroll: 0,
            console: Vec::new(),
            console_back: 0,
            info: "Press r to run, ? for help".into(),
            show_help: false,
        }
    }

    pub fn apply(&mut self, ev: RunEvent) {
        match ev {
            RunEvent::Cleared => {
                self.console.clear();
                self.console_back = 0;
            }
            RunEvent::Line(line) => {
                self.console.push(line);
                if self.console.len() > MAX_CONSOLE_LINES {
                    let excess = self.console.len() - MAX_CONSOLE_LINES;
                    self.console.drain(..excess);
                }
            }
            RunEvent::StateChanged(state) => {
                self.info = format!("State: {state:?}");
            }
            RunEvent::Info(msg) => self.info = msg,
            RunEvent::RunCompleted { report } => {
                self.info = format!(
                    "Run {} in {}",
                    report.outcome.label(),
                    humantime::format_duration(std::time::Duration::from_millis(
                        report.elapsed.as_millis() as u64
                    ))
                );
            }
        }
    }

    /// Re-read the source file so edits made in an external editor are picked up.
    pub fn reload_source(&mut self) -> Result<()> {
        if let Some(path) = self.source_path.as_ref() {
            self.source = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
        }
        Ok(())
    }

    pub fn scroll_source(&mut self, delta: i32) {
        // ratatui scroll offsets are u16; longer sources stop at the last reachable line.
        let max = self
            .source
            .lines()
            .count()
            .saturating_sub(1)
            .min(u16::MAX as usize) as i64;
        let next = (self.source_scroll as i64 + delta as i64).clamp(0, max);
        self.source_scroll = next as u16;
    }

    pub fn scroll_console(&mut self, delta: i32) {
        let max = self.console.len().saturating_sub(1) as i64;
        let next = (self.console_back as i64 + delta as i64).clamp(0, max.max(0));
        self.console_back = next as usize;
    }

    /// First console line to show in a pane `height` lines tall.
    pub fn console_offset(&self, height: usize) -> usize {
        self.console
            .len()
            .saturating_sub(height)
            .saturating_sub(self.console_back)
    }
}
