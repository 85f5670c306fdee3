use crate::model::{Mode, Outcome, Phase};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RunError>;

/// Failures of a single run. None of these escape the orchestrator; each one is
/// rendered into the console and into the run's [`Outcome`].
#[derive(Error, Debug)]
pub enum RunError {
    #[error("could not prepare workspace {}: {source}", .path.display())]
    WorkspaceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{mode} compilation failed with exit code {}.", exit_label(.code))]
    CompileFailed { mode: Mode, code: Option<i32> },

    #[error("{mode} compilation seemed to succeed, but {artifact} not found. Ensure your {mode} code has a public class Main.")]
    ArtifactMissing { mode: Mode, artifact: String },

    #[error("failed to launch {program} ({phase}): {source}")]
    ProcessSpawn {
        program: String,
        phase: Phase,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for {program} ({phase}): {source}")]
    ProcessWait {
        program: String,
        phase: Phase,
        #[source]
        source: std::io::Error,
    },

    #[error("Error stopping process: {source}")]
    Cancellation {
        phase: Phase,
        #[source]
        source: std::io::Error,
    },
}

impl RunError {
    /// Line appended to the console when this error ends a run.
    pub fn console_line(&self) -> String {
        match self {
            RunError::CompileFailed { .. } | RunError::ArtifactMissing { .. } => self.to_string(),
            _ => format!("ERROR: {self}"),
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            RunError::WorkspaceIo { .. } => Outcome::Failed {
                phase: Phase::Stage,
                message: self.to_string(),
            },
            RunError::CompileFailed { code, .. } => Outcome::CompileFailed { exit_code: *code },
            RunError::ArtifactMissing { artifact, .. } => Outcome::ArtifactMissing {
                artifact: artifact.clone(),
            },
            RunError::ProcessSpawn { phase, .. } | RunError::ProcessWait { phase, .. } => {
                Outcome::Failed {
                    phase: *phase,
                    message: self.to_string(),
                }
            }
            RunError::Cancellation { phase, .. } => Outcome::Cancelled {
                phase: *phase,
                exit_code: None,
            },
        }
    }
}

/// Render an exit code, or `unknown` when the process was ended by a signal.
pub fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "unknown".to_string(),
    }
}
