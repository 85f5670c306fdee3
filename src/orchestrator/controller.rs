//! Run lifecycle controller.
//!
//! Turns UI commands into orchestrator calls and emits notices for presentation layers.

use super::handle::Orchestrator;
use anyhow::Result;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Duration, Instant};
use tracing::{info, warn};

/// How long a stop may take before the UI is told it is still in progress.
const STOP_GRACE: Duration = Duration::from_secs(3);

/// Commands emitted by UI layers to control runs.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Run { text: String },
    Stop,
    ToggleMode,
    Quit,
}

/// Serve UI commands until `Quit` (or the UI hangs up), then tear down.
pub(crate) async fn run_controller(
    orch: Orchestrator,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    // Stop watchdog: if a kill takes too long, keep UI feedback alive.
    let mut stop_deadline: Option<Instant> = None;
    let mut watchdog = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Run { text }) => {
                        if orch.run(text, orch.mode()).is_none() {
                            orch.notify("A run is already in progress.");
                        }
                    }
                    Some(UiCommand::Stop) => {
                        if orch.cancel() {
                            stop_deadline = Some(Instant::now() + STOP_GRACE);
                        } else {
                            orch.notify("Nothing to stop.");
                        }
                    }
                    Some(UiCommand::ToggleMode) => {
                        let next = orch.mode().toggled();
                        if !orch.select_mode(next) {
                            orch.notify("Mode can only change while idle.");
                        }
                    }
                    Some(UiCommand::Quit) | None => break,
                }
            }
            _ = watchdog.tick() => {
                if let Some(deadline) = stop_deadline {
                    if orch.state().is_idle() {
                        stop_deadline = None;
                    } else if Instant::now() >= deadline {
                        orch.notify("Still stopping…");
                        stop_deadline = None;
                    }
                }
            }
        }
    }

    // Quit waits briefly for the active run so its own cleanup can finish. A stop
    // only lands once a child is alive, so keep asking until one is or the run ends.
    let settle = async {
        while !orch.state().is_idle() {
            if orch.cancel() {
                info!("quit requested while a run is active");
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };
    if tokio::time::timeout(STOP_GRACE, settle).await.is_err() {
        warn!("run did not stop within {:?}; forcing cleanup", STOP_GRACE);
    }
    orch.shutdown();
    Ok(())
}
