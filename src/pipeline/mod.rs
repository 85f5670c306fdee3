mod process;
mod toolchain;
mod workspace;

pub use toolchain::{Invocation, ToolchainPlan};
pub use workspace::TempWorkspace;

use crate::console::Console;
use crate::error::{exit_label, Result, RunError};
use crate::model::{ActiveProcess, Mode, Outcome, Phase, RunConfig, RunReport};
use process::MergedChild;
use std::path::Path;
use std::process::ExitStatus;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a child process step ended.
enum StepExit {
    Exited(ExitStatus),
    Cancelled(Option<i32>),
}

/// One compile-then-execute run. Consumed by [`RunPipeline::run`].
pub struct RunPipeline {
    mode: Mode,
    plan: ToolchainPlan,
    workspace: TempWorkspace,
    console: Console,
    cancel: CancellationToken,
}

impl RunPipeline {
    pub fn new(cfg: &RunConfig, mode: Mode, console: Console, cancel: CancellationToken) -> Self {
        Self {
            mode,
            plan: ToolchainPlan::for_mode(mode, &cfg.toolchain),
            workspace: TempWorkspace::new(cfg.workspace_dir.clone()),
            console,
            cancel,
        }
    }

    pub async fn run(self, text: String) -> RunReport {
        let started = Instant::now();
        let timestamp_utc = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into());
        let guard = CleanupGuard {
            console: self.console.clone(),
            workspace: self.workspace.clone(),
            armed: true,
        };

        let outcome = match self.stages(&text).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(mode = %self.mode, "run failed: {e}");
                self.console.push(e.console_line());
                e.outcome()
            }
        };
        info!(mode = %self.mode, outcome = outcome.label(), "run finished");

        let mode = self.mode;
        guard
            .finish(move |lines| RunReport {
                timestamp_utc,
                mode,
                outcome,
                elapsed: started.elapsed(),
                lines,
            })
            .await
    }

    async fn stages(&self, text: &str) -> Result<Outcome> {
        let plan = &self.plan;

        self.workspace.prepare().await?;
        let script = self.workspace.write_script(plan.script_name, text).await?;
        self.console
            .push(format!("Saved code to {}", script.display()));

        self.console.push(format!("Compiling {}...", self.mode));
        match self
            .step(Phase::Compile, &plan.compile, Some(plan.compile_prefix))
            .await?
        {
            StepExit::Cancelled(exit_code) => {
                return Ok(Outcome::Cancelled {
                    phase: Phase::Compile,
                    exit_code,
                })
            }
            StepExit::Exited(status) if !status.success() => {
                return Err(RunError::CompileFailed {
                    mode: self.mode,
                    code: status.code(),
                })
            }
            StepExit::Exited(_) => {}
        }

        let artifact = match self.workspace.artifact(plan.artifact).await {
            Some(path) => path,
            None if plan.verify_artifact => {
                return Err(RunError::ArtifactMissing {
                    mode: self.mode,
                    artifact: plan.artifact.to_string(),
                })
            }
            None => self.workspace.path().join(plan.artifact),
        };
        self.console.push(format!(
            "{} compilation successful: {}",
            self.mode,
            artifact.display()
        ));

        if !self.console.begin_execute() {
            self.console
                .push(format!("Run stopped before {} started.", Phase::Execute));
            return Ok(Outcome::Cancelled {
                phase: Phase::Execute,
                exit_code: None,
            });
        }
        self.console.push(plan.execute_banner);
        match self.step(Phase::Execute, &plan.execute, None).await? {
            StepExit::Cancelled(exit_code) => Ok(Outcome::Cancelled {
                phase: Phase::Execute,
                exit_code,
            }),
            StepExit::Exited(status) => {
                let exit_code = status.code();
                self.console.push(format!(
                    "{} execution finished with exit code {}.",
                    self.mode,
                    exit_label(&exit_code)
                ));
                Ok(Outcome::Completed { exit_code })
            }
        }
    }

    /// Spawn one child, stream its merged output live, and wait for it to exit.
    async fn step(
        &self,
        phase: Phase,
        inv: &Invocation,
        prefix: Option<&str>,
    ) -> Result<StepExit> {
        if self.cancel.is_cancelled() {
            self.console
                .push(format!("Run stopped before {phase} started."));
            return Ok(StepExit::Cancelled(None));
        }

        let cwd: &Path = self.workspace.path();
        let mut child = MergedChild::spawn(inv, cwd).map_err(|source| RunError::ProcessSpawn {
            program: inv.program_name(),
            phase,
            source,
        })?;
        self.console.set_active(Some(ActiveProcess {
            phase,
            program: inv.program_name(),
            pid: child.id(),
        }));

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                line = child.next_line() => Some(line),
            };
            match next {
                None => return Ok(StepExit::Cancelled(self.terminate(phase, &mut child).await)),
                Some(Some(line)) => match prefix {
                    Some(p) => self.console.push(format!("{p}{line}")),
                    None => self.console.push(line),
                },
                Some(None) => break,
            }
        }

        let waited = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            status = child.wait() => Some(status),
        };
        let status = match waited {
            None => return Ok(StepExit::Cancelled(self.terminate(phase, &mut child).await)),
            Some(status) => status.map_err(|source| RunError::ProcessWait {
                program: inv.program_name(),
                phase,
                source,
            })?,
        };
        self.console.set_active(None);
        debug!(%phase, ?status, "child exited");
        Ok(StepExit::Exited(status))
    }

    /// Kill the active child after a stop request. Failures are reported, never raised.
    async fn terminate(&self, phase: Phase, child: &mut MergedChild) -> Option<i32> {
        info!(pid = ?child.id(), "killing child process");
        let code = match child.kill().await {
            Ok(status) => {
                let code = status.code();
                self.console.push(format!(
                    "Process stopped by user (exit code: {}).",
                    exit_label(&code)
                ));
                code
            }
            Err(source) => {
                let err = RunError::Cancellation { phase, source };
                warn!("{err}");
                self.console.push(err.to_string());
                None
            }
        };
        self.console.set_active(None);
        code
    }
}

/// Reclaims the workspace and releases the run slot however the run ends.
struct CleanupGuard {
    console: Console,
    workspace: TempWorkspace,
    armed: bool,
}

impl CleanupGuard {
    async fn finish(mut self, build: impl FnOnce(Vec<String>) -> RunReport) -> RunReport {
        self.armed = false;
        self.console.set_active(None);
        // The slot is released only after the directory is gone.
        match self.workspace.remove().await {
            Ok(true) => self.console.push("Cleaned up temporary files."),
            Ok(false) => {}
            Err(e) => self.console.push(format!(
                "Failed to clean up {}: {e}",
                self.workspace.path().display()
            )),
        }
        self.console.finish_run(build)
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("run torn down before cleanup; removing workspace");
        let _ = self.workspace.remove_now();
        self.console.abandon_run();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::model::{RunEvent, RunState};
    use crate::test_support::{fake_config, fake_tool};
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Fixture {
        _tmp: tempfile::TempDir,
        cfg: RunConfig,
        console: Console,
        events: mpsc::UnboundedReceiver<RunEvent>,
    }

    fn fixture(javac: &str, java: &str) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = fake_config(tmp.path(), javac, java, "touch Main.jar");
        let (tx, events) = mpsc::unbounded_channel();
        Fixture {
            _tmp: tmp,
            cfg,
            console: Console::new(tx),
            events,
        }
    }

    async fn run(fx: &Fixture, mode: Mode, cancel: CancellationToken) -> RunReport {
        assert!(fx
            .console
            .try_begin(mode, cancel.clone(), format!("Starting execution ({mode})...")));
        RunPipeline::new(&fx.cfg, mode, fx.console.clone(), cancel)
            .run("class Main {}".into())
            .await
    }

    #[tokio::test]
    async fn successful_java_run_streams_both_phases() {
        let fx = fixture(
            "echo 'Note: compiled'; touch Main.class",
            "echo Hello; echo oops >&2; exit 0",
        );
        let report = run(&fx, Mode::Java, CancellationToken::new()).await;

        assert_eq!(report.outcome, Outcome::Completed { exit_code: Some(0) });
        let lines = &report.lines;
        assert!(lines.contains(&"JAVAC: Note: compiled".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("Java compilation successful: ")));
        assert!(lines.contains(&"Hello".to_string()));
        assert!(lines.contains(&"oops".to_string()));
        assert!(lines.contains(&"Java execution finished with exit code 0.".to_string()));
        assert_eq!(lines.last().unwrap(), "Cleaned up temporary files.");
        assert!(!fx.cfg.workspace_dir.exists());
        assert_eq!(fx.console.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn script_is_staged_verbatim_in_the_workspace() {
        let fx = fixture("cp Main.java ../seen.txt; touch Main.class", "true");
        run(&fx, Mode::Java, CancellationToken::new()).await;
        let seen = fx.cfg.workspace_dir.parent().unwrap().join("seen.txt");
        assert_eq!(std::fs::read_to_string(seen).unwrap(), "class Main {}");
    }

    #[tokio::test]
    async fn compile_failure_skips_execute() {
        let fx = fixture("echo 'Main.java:1: error' >&2; exit 2", "echo SHOULD-NOT-RUN");
        let report = run(&fx, Mode::Java, CancellationToken::new()).await;

        assert_eq!(report.outcome, Outcome::CompileFailed { exit_code: Some(2) });
        assert!(report.lines.contains(&"JAVAC: Main.java:1: error".to_string()));
        assert!(report
            .lines
            .contains(&"Java compilation failed with exit code 2.".to_string()));
        assert!(!report.lines.iter().any(|l| l.contains("SHOULD-NOT-RUN")));
        assert!(!report.lines.iter().any(|l| l.starts_with("Running")));
        assert!(!fx.cfg.workspace_dir.exists());
    }

    #[tokio::test]
    async fn missing_class_file_is_reported_distinctly() {
        let fx = fixture("touch Foo.class", "echo SHOULD-NOT-RUN");
        let report = run(&fx, Mode::Java, CancellationToken::new()).await;

        assert_eq!(
            report.outcome,
            Outcome::ArtifactMissing {
                artifact: "Main.class".into()
            }
        );
        assert!(report
            .lines
            .iter()
            .any(|l| l.contains("Main.class not found")));
        assert!(!report.lines.iter().any(|l| l.contains("SHOULD-NOT-RUN")));
        assert!(!fx.cfg.workspace_dir.exists());
    }

    #[tokio::test]
    async fn kotlin_jar_is_not_checked() {
        let fx = fixture("true", "echo \"args: $*\"");
        let mut cfg = fx.cfg.clone();
        // A compiler that produces nothing still proceeds to execute in Kotlin mode.
        cfg.toolchain.kotlinc = fake_tool(fx.cfg.workspace_dir.parent().unwrap(), "kc", "true");
        let cancel = CancellationToken::new();
        fx.console.try_begin(Mode::Kotlin, cancel.clone(), "start".into());
        let report = RunPipeline::new(&cfg, Mode::Kotlin, fx.console.clone(), cancel)
            .run("fun main() {}".into())
            .await;
        assert_eq!(report.outcome, Outcome::Completed { exit_code: Some(0) });
        assert!(report.lines.contains(&"Running Kotlin JAR...".to_string()));
        assert!(report.lines.contains(&"args: -jar Main.jar".to_string()));
    }

    #[tokio::test]
    async fn nonzero_program_exit_is_a_normal_report() {
        let fx = fixture("touch Main.class", "exit 7");
        let report = run(&fx, Mode::Java, CancellationToken::new()).await;
        assert_eq!(report.outcome, Outcome::Completed { exit_code: Some(7) });
        assert!(report
            .lines
            .contains(&"Java execution finished with exit code 7.".to_string()));
    }

    #[tokio::test]
    async fn missing_compiler_is_a_spawn_error() {
        let mut fx = fixture("true", "true");
        fx.cfg.toolchain.javac = PathBuf::from("/nonexistent/javac");
        let report = run(&fx, Mode::Java, CancellationToken::new()).await;
        assert!(matches!(
            report.outcome,
            Outcome::Failed {
                phase: Phase::Compile,
                ..
            }
        ));
        assert!(report.lines.iter().any(|l| l.starts_with("ERROR: failed to launch")));
        assert!(!fx.cfg.workspace_dir.exists());
    }

    #[tokio::test]
    async fn unwritable_workspace_spawns_nothing() {
        let mut fx = fixture("touch Main.class", "true");
        let blocker = fx.cfg.workspace_dir.with_file_name("blocker");
        std::fs::write(&blocker, b"").unwrap();
        fx.cfg.workspace_dir = blocker.join("ide_temp_run");
        let report = run(&fx, Mode::Java, CancellationToken::new()).await;
        assert!(matches!(
            report.outcome,
            Outcome::Failed {
                phase: Phase::Stage,
                ..
            }
        ));
        assert!(report.lines.iter().any(|l| l.starts_with("ERROR: could not prepare workspace")));
        assert_eq!(fx.console.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn cancel_mid_compile_kills_and_cleans_up() {
        let fx = fixture("echo compiling; exec sleep 30", "echo SHOULD-NOT-RUN");
        let cancel = CancellationToken::new();
        let console = fx.console.clone();
        let stopper = tokio::spawn(async move {
            // Wait until the compiler has produced output, then stop.
            while !console.lines().iter().any(|l| l == "JAVAC: compiling") {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            assert!(console.request_stop("Attempting to stop process..."));
        });
        let report = tokio::time::timeout(Duration::from_secs(10), run(&fx, Mode::Java, cancel))
            .await
            .expect("cancelled run must finish promptly");
        stopper.await.unwrap();

        assert!(matches!(
            report.outcome,
            Outcome::Cancelled {
                phase: Phase::Compile,
                ..
            }
        ));
        assert!(report
            .lines
            .iter()
            .any(|l| l.starts_with("Process stopped by user (exit code: ")));
        assert!(!report.lines.iter().any(|l| l.starts_with("Running")));
        assert!(!fx.cfg.workspace_dir.exists());
        assert_eq!(fx.console.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn stale_class_from_a_crashed_session_is_not_reused() {
        let fx = fixture("touch Foo.class", "echo STALE-RAN");
        // What a killed session leaves behind: our marker plus an old build.
        let ws = &fx.cfg.workspace_dir;
        std::fs::create_dir_all(ws).unwrap();
        std::fs::write(ws.join(workspace::MARKER), b"").unwrap();
        std::fs::write(ws.join("Main.class"), b"old").unwrap();

        let report = run(&fx, Mode::Java, CancellationToken::new()).await;
        assert_eq!(
            report.outcome,
            Outcome::ArtifactMissing {
                artifact: "Main.class".into()
            }
        );
        assert!(!report.lines.iter().any(|l| l.contains("STALE-RAN")));
        assert!(!ws.exists());
    }

    #[tokio::test]
    async fn existing_user_directory_is_never_used_or_deleted() {
        let mut fx = fixture("touch ../compiled; touch Main.class", "true");
        let project = fx.cfg.workspace_dir.with_file_name("my_project");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join("important.txt"), b"keep me").unwrap();
        fx.cfg.workspace_dir = project.clone();

        let report = run(&fx, Mode::Java, CancellationToken::new()).await;
        assert!(matches!(
            report.outcome,
            Outcome::Failed {
                phase: Phase::Stage,
                ..
            }
        ));
        assert_eq!(std::fs::read(project.join("important.txt")).unwrap(), b"keep me");
        assert!(!project.join("Main.java").exists());
        assert!(!project.with_file_name("compiled").exists());
        assert!(!report.lines.contains(&"Cleaned up temporary files.".to_string()));
        assert_eq!(fx.console.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn stop_before_spawn_skips_the_compiler() {
        let fx = fixture("touch ../compiled", "true");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = run(&fx, Mode::Java, cancel).await;
        assert!(report
            .lines
            .contains(&"Run stopped before compile started.".to_string()));
        assert!(!fx.cfg.workspace_dir.with_file_name("compiled").exists());
    }

    #[tokio::test]
    async fn events_mirror_the_history() {
        let mut fx = fixture("touch Main.class", "echo Hello");
        let report = run(&fx, Mode::Java, CancellationToken::new()).await;

        let mut lines = Vec::new();
        let mut states = Vec::new();
        let mut completed = false;
        while let Ok(ev) = fx.events.try_recv() {
            match ev {
                RunEvent::Cleared => lines.clear(),
                RunEvent::Line(l) => lines.push(l),
                RunEvent::StateChanged(s) => states.push(s),
                RunEvent::RunCompleted { .. } => completed = true,
                RunEvent::Info(_) => {}
            }
        }
        assert_eq!(lines, report.lines);
        assert_eq!(
            states,
            vec![RunState::Compiling, RunState::Running, RunState::Idle]
        );
        assert!(completed);
    }

    #[tokio::test]
    async fn dropped_run_still_reclaims_the_workspace() {
        let fx = fixture("exec sleep 30", "true");
        let cancel = CancellationToken::new();
        fx.console.try_begin(Mode::Java, cancel.clone(), "start".into());
        let pipeline = RunPipeline::new(&fx.cfg, Mode::Java, fx.console.clone(), cancel);
        let task = tokio::spawn(pipeline.run("class Main {}".into()));
        while !fx.cfg.workspace_dir.join("Main.java").exists() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        task.abort();
        let _ = task.await;
        assert!(!fx.cfg.workspace_dir.exists());
        assert_eq!(fx.console.state(), RunState::Idle);
    }
}
