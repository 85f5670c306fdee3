//! Text summary builder for CLI output.
//!
//! Formats the closing lines text mode prints to stderr after a run.

use crate::error::exit_label;
use crate::model::{Outcome, RunReport};
use std::time::Duration;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary from a finished run's report.
pub(crate) fn build_text_summary(report: &RunReport) -> TextSummary {
    let mut lines = Vec::new();

    let detail = match &report.outcome {
        Outcome::Completed { exit_code } | Outcome::CompileFailed { exit_code } => {
            format!("exit code {}", exit_label(exit_code))
        }
        Outcome::ArtifactMissing { artifact } => format!("{artifact} not produced"),
        Outcome::Cancelled { phase, exit_code } => {
            format!("during {phase}, exit code {}", exit_label(exit_code))
        }
        Outcome::Failed { phase, message } => format!("during {phase}: {message}"),
    };
    lines.push(format!("Outcome: {} ({detail})", report.outcome.label()));
    lines.push(format!("Mode: {}", report.mode));

    // Millisecond precision is plenty for a human reading the summary.
    let elapsed = Duration::from_millis(report.elapsed.as_millis() as u64);
    lines.push(format!(
        "Elapsed: {} (started {})",
        humantime::format_duration(elapsed),
        report.timestamp_utc
    ));

    TextSummary { lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Mode, Phase};

    fn report(outcome: Outcome) -> RunReport {
        RunReport {
            timestamp_utc: "2026-01-02T03:04:05Z".into(),
            mode: Mode::Kotlin,
            outcome,
            elapsed: Duration::from_micros(1_234_567),
            lines: Vec::new(),
        }
    }

    #[test]
    fn completed_run() {
        let s = build_text_summary(&report(Outcome::Completed { exit_code: Some(0) }));
        assert_eq!(s.lines[0], "Outcome: completed (exit code 0)");
        assert_eq!(s.lines[1], "Mode: Kotlin");
        assert_eq!(
            s.lines[2],
            "Elapsed: 1s 234ms (started 2026-01-02T03:04:05Z)"
        );
    }

    #[test]
    fn cancelled_without_exit_code() {
        let s = build_text_summary(&report(Outcome::Cancelled {
            phase: Phase::Execute,
            exit_code: None,
        }));
        assert_eq!(
            s.lines[0],
            "Outcome: cancelled (during execute, exit code unknown)"
        );
    }
}
