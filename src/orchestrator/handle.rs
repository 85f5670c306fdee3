//! Consumer-facing run orchestrator.
//!
//! Owns the single run slot, the workspace, and the active child. UI layers call
//! `run`/`cancel` and observe effects through snapshots or the event channel.

use crate::console::{Console, Snapshot};
use crate::model::{Mode, RunConfig, RunEvent, RunReport, RunState};
use crate::pipeline::{RunPipeline, TempWorkspace};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const STOP_NOTICE: &str = "Attempting to stop process...";

#[derive(Clone)]
pub struct Orchestrator {
    cfg: Arc<RunConfig>,
    console: Console,
}

impl Orchestrator {
    pub fn new(cfg: RunConfig) -> (Self, UnboundedReceiver<RunEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            cfg: Arc::new(cfg),
            console: Console::new(event_tx),
        };
        (orchestrator, event_rx)
    }

    #[cfg(test)]
    pub fn config(&self) -> &RunConfig {
        &self.cfg
    }

    /// Start a run on the current Tokio runtime.
    ///
    /// Returns `None` and changes nothing if a run is already in flight. The
    /// returned handle may be dropped; the run continues and reports through events.
    pub fn run(&self, text: impl Into<String>, mode: Mode) -> Option<JoinHandle<RunReport>> {
        let cancel = CancellationToken::new();
        let banner = format!("Starting execution ({mode})...");
        if !self.console.try_begin(mode, cancel.clone(), banner) {
            debug!(state = ?self.console.state(), "run request ignored");
            return None;
        }
        info!(%mode, "run accepted");
        let pipeline = RunPipeline::new(&self.cfg, mode, self.console.clone(), cancel);
        let text = text.into();
        Some(tokio::spawn(async move { pipeline.run(text).await }))
    }

    /// Kill the active child process. Returns false, and changes nothing, when no
    /// child is alive (idle, staging, between steps, or already stopping).
    pub fn cancel(&self) -> bool {
        let requested = self.console.request_stop(STOP_NOTICE);
        if requested {
            info!("stop requested");
        }
        requested
    }

    pub fn state(&self) -> RunState {
        self.console.state()
    }

    pub fn mode(&self) -> Mode {
        self.console.mode()
    }

    pub fn output_lines(&self) -> Vec<String> {
        self.console.lines()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.console.snapshot()
    }

    /// Status notice for presentation layers; not added to the output history.
    pub fn notify(&self, message: impl Into<String>) {
        self.console.info(message);
    }

    /// Change the selected mode; refused while a run is active.
    pub fn select_mode(&self, mode: Mode) -> bool {
        self.console.select_mode(mode)
    }

    pub async fn wait_idle(&self) {
        let mut rx = self.console.subscribe_state();
        // The sender lives as long as the console, so this only ends on Idle.
        let _ = rx.wait_for(|s| s.is_idle()).await;
    }

    /// Last-resort teardown on application exit: stop any run and remove the
    /// workspace synchronously.
    pub fn shutdown(&self) {
        self.console.cancel_active();
        let workspace = TempWorkspace::new(self.cfg.workspace_dir.clone());
        if workspace.is_owned() {
            info!(dir = %workspace.path().display(), "cleaning up temporary files on exit");
            if let Err(e) = workspace.remove_now() {
                warn!("shutdown cleanup failed: {e}");
            }
        }
    }
}
