//! Shared run state: the state machine cell, the append-only output history and
//! the active-process slot.
//!
//! The pipeline task writes; UI layers read snapshots or consume [`RunEvent`]s.
//! Every mutation emits its event while the cell is locked, so the event stream
//! and the history never disagree on ordering.

use crate::model::{ActiveProcess, Mode, RunEvent, RunReport, RunState};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc::UnboundedSender, watch};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct Shared {
    state: RunState,
    mode: Mode,
    lines: Vec<String>,
    active: Option<ActiveProcess>,
    cancel: Option<CancellationToken>,
}

/// Read-only copy of the shared state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub state: RunState,
    pub mode: Mode,
    pub lines: Vec<String>,
    pub active: Option<ActiveProcess>,
}

#[derive(Clone)]
pub struct Console {
    shared: Arc<Mutex<Shared>>,
    state_tx: Arc<watch::Sender<RunState>>,
    event_tx: UnboundedSender<RunEvent>,
}

impl Console {
    pub fn new(event_tx: UnboundedSender<RunEvent>) -> Self {
        let (state_tx, _) = watch::channel(RunState::Idle);
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            state_tx: Arc::new(state_tx),
            event_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Receivers may be gone (e.g. headless JSON mode drops them); that is fine.
    fn emit(&self, ev: RunEvent) {
        let _ = self.event_tx.send(ev);
    }

    fn set_state_locked(&self, shared: &mut Shared, state: RunState) {
        if shared.state != state {
            shared.state = state;
            self.state_tx.send_replace(state);
            self.emit(RunEvent::StateChanged(state));
        }
    }

    pub fn state(&self) -> RunState {
        self.lock().state
    }

    pub fn mode(&self) -> Mode {
        self.lock().mode
    }

    pub fn lines(&self) -> Vec<String> {
        self.lock().lines.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        let shared = self.lock();
        Snapshot {
            state: shared.state,
            mode: shared.mode,
            lines: shared.lines.clone(),
            active: shared.active.clone(),
        }
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RunState> {
        self.state_tx.subscribe()
    }

    pub fn push(&self, line: impl Into<String>) {
        let line = line.into();
        let mut shared = self.lock();
        shared.lines.push(line.clone());
        self.emit(RunEvent::Line(line));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(RunEvent::Info(message.into()));
    }

    /// Claim the single run slot. Fails without touching anything unless idle.
    pub fn try_begin(&self, mode: Mode, cancel: CancellationToken, banner: String) -> bool {
        let mut shared = self.lock();
        if !shared.state.is_idle() {
            return false;
        }
        shared.mode = mode;
        shared.lines.clear();
        shared.cancel = Some(cancel);
        self.emit(RunEvent::Cleared);
        self.set_state_locked(&mut shared, RunState::Compiling);
        shared.lines.push(banner.clone());
        self.emit(RunEvent::Line(banner));
        true
    }

    /// Move from `Compiling` to `Running`. Returns false if a stop was requested meanwhile.
    pub fn begin_execute(&self) -> bool {
        let mut shared = self.lock();
        if shared.state != RunState::Compiling {
            return false;
        }
        self.set_state_locked(&mut shared, RunState::Running);
        true
    }

    /// Request a stop of the active child process.
    ///
    /// No-op unless a child is alive: while idle, already stopping, staging, or
    /// between the compile and execute steps.
    pub fn request_stop(&self, notice: &str) -> bool {
        let mut shared = self.lock();
        if shared.active.is_none()
            || !matches!(shared.state, RunState::Compiling | RunState::Running)
        {
            return false;
        }
        self.set_state_locked(&mut shared, RunState::Stopping);
        shared.lines.push(notice.to_string());
        self.emit(RunEvent::Line(notice.to_string()));
        if let Some(token) = shared.cancel.as_ref() {
            token.cancel();
        }
        true
    }

    /// Cancel whatever run holds the slot, without touching the state machine.
    pub fn cancel_active(&self) {
        if let Some(token) = self.lock().cancel.as_ref() {
            token.cancel();
        }
    }

    pub fn set_active(&self, active: Option<ActiveProcess>) {
        self.lock().active = active;
    }

    pub fn select_mode(&self, mode: Mode) -> bool {
        let mut shared = self.lock();
        if !shared.state.is_idle() {
            return false;
        }
        shared.mode = mode;
        let line = format!("Switched to {mode} mode.");
        shared.lines.push(line.clone());
        self.emit(RunEvent::Line(line));
        true
    }

    /// Release the run slot and publish the final report built from the history.
    pub fn finish_run(&self, build: impl FnOnce(Vec<String>) -> RunReport) -> RunReport {
        let mut shared = self.lock();
        shared.active = None;
        shared.cancel = None;
        let report = build(shared.lines.clone());
        self.set_state_locked(&mut shared, RunState::Idle);
        self.emit(RunEvent::RunCompleted {
            report: Box::new(report.clone()),
        });
        report
    }

    /// Release the run slot without a report; used when a run is torn down abnormally.
    pub fn abandon_run(&self) {
        let mut shared = self.lock();
        shared.active = None;
        shared.cancel = None;
        self.set_state_locked(&mut shared, RunState::Idle);
    }
}
