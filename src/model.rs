use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default name of the per-run scratch directory, relative to the working directory.
pub const DEFAULT_WORKSPACE_DIR: &str = "ide_temp_run";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainConfig {
    pub javac: PathBuf,
    pub java: PathBuf,
    pub kotlinc: PathBuf,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            javac: PathBuf::from("javac"),
            java: PathBuf::from("java"),
            kotlinc: PathBuf::from("kotlinc"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub workspace_dir: PathBuf,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    /// Headless runs are cancelled once this elapses.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from(DEFAULT_WORKSPACE_DIR),
            toolchain: ToolchainConfig::default(),
            timeout: None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Java,
    Kotlin,
}

impl Mode {
    /// Pick a mode from a source file extension; anything but Kotlin is treated as Java.
    pub fn from_path(path: &std::path::Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("kt") | Some("kts") => Mode::Kotlin,
            _ => Mode::Java,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Mode::Java => Mode::Kotlin,
            Mode::Kotlin => Mode::Java,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Java => f.write_str("Java"),
            Mode::Kotlin => f.write_str("Kotlin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Idle,
    Compiling,
    Running,
    Stopping,
}

impl RunState {
    pub fn is_idle(self) -> bool {
        self == RunState::Idle
    }
}

/// Step of a run, used to label failures and cancellations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Stage,
    Compile,
    Execute,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Stage => f.write_str("staging"),
            Phase::Compile => f.write_str("compile"),
            Phase::Execute => f.write_str("execute"),
        }
    }
}

/// The child process currently owned by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveProcess {
    pub phase: Phase,
    pub program: String,
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Completed { exit_code: Option<i32> },
    CompileFailed { exit_code: Option<i32> },
    ArtifactMissing { artifact: String },
    Cancelled { phase: Phase, exit_code: Option<i32> },
    Failed { phase: Phase, message: String },
}

impl Outcome {
    /// Exit code the headless CLI should return for this outcome.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Outcome::Completed { exit_code } => exit_code.unwrap_or(1),
            _ => 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Completed { .. } => "completed",
            Outcome::CompileFailed { .. } => "compile failed",
            Outcome::ArtifactMissing { .. } => "artifact missing",
            Outcome::Cancelled { .. } => "cancelled",
            Outcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub timestamp_utc: String,
    pub mode: Mode,
    pub outcome: Outcome,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub lines: Vec<String>,
}

/// Events emitted by the orchestrator and consumed by UI/CLI layers.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// Output history was reset at the start of a run.
    Cleared,
    Line(String),
    StateChanged(RunState),
    /// Status notices from the controller; not part of the output history.
    Info(String),
    RunCompleted {
        // Boxed so the line-heavy variants stay small.
        report: Box<RunReport>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn mode_follows_extension() {
        assert_eq!(Mode::from_path(Path::new("Main.kt")), Mode::Kotlin);
        assert_eq!(Mode::from_path(Path::new("script.kts")), Mode::Kotlin);
        assert_eq!(Mode::from_path(Path::new("Main.java")), Mode::Java);
        assert_eq!(Mode::from_path(Path::new("README")), Mode::Java);
    }

    #[test]
    fn outcome_serializes_with_kind_tag() {
        let v = serde_json::to_value(Outcome::Cancelled {
            phase: Phase::Compile,
            exit_code: None,
        })
        .unwrap();
        assert_eq!(v["kind"], "cancelled");
        assert_eq!(v["phase"], "compile");
    }

    #[test]
    fn only_completed_runs_forward_the_program_exit_code() {
        assert_eq!(Outcome::Completed { exit_code: Some(3) }.process_exit_code(), 3);
        assert_eq!(
            Outcome::CompileFailed { exit_code: Some(0) }.process_exit_code(),
            1
        );
    }
}
