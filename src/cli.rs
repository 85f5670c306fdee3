use crate::model::{Mode, RunConfig, RunEvent, RunReport, ToolchainConfig, DEFAULT_WORKSPACE_DIR};
use crate::orchestrator::Orchestrator;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tracing::info;

/// Starter program shown when no file is given.
pub const TEMPLATE: &str = r#"// Scratchpad: edit FILE in your editor and press r to compile and run.

public class Main {
    public static void main(String[] args) {
        System.out.println("Hello from Java!");
    }
}
"#;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "jvm-scratch",
    version,
    about = "Compile and run a Java or Kotlin scratch file, with an optional TUI"
)]
pub struct Cli {
    /// Source file to run; headless modes read stdin when omitted
    pub file: Option<PathBuf>,

    /// Language toolchain (default: from the file extension, else java)
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Run once and stream console output as text (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Run once and print the run report as JSON (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print highlighter spans for FILE as JSON and exit
    #[arg(long)]
    pub highlight: bool,

    /// Scratch directory, created per run and removed afterwards
    #[arg(long, default_value = DEFAULT_WORKSPACE_DIR)]
    pub workspace: PathBuf,

    /// Java compiler executable
    #[arg(long, default_value = "javac")]
    pub javac: PathBuf,

    /// Java launcher executable
    #[arg(long, default_value = "java")]
    pub java: PathBuf,

    /// Kotlin compiler executable
    #[arg(long, default_value = "kotlinc")]
    pub kotlinc: PathBuf,

    /// Stop a headless run after this long (e.g. 30s, 2m)
    #[arg(long)]
    pub timeout: Option<humantime::Duration>,
}

impl Cli {
    pub fn is_headless(&self) -> bool {
        self.text || self.json || self.highlight || cfg!(not(feature = "tui"))
    }

    /// Explicit `--mode`, else inferred from FILE.
    pub fn resolve_mode(&self) -> Mode {
        self.mode
            .or_else(|| self.file.as_deref().map(Mode::from_path))
            .unwrap_or_default()
    }
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> RunConfig {
    RunConfig {
        workspace_dir: args.workspace.clone(),
        toolchain: ToolchainConfig {
            javac: args.javac.clone(),
            java: args.java.clone(),
            kotlinc: args.kotlinc.clone(),
        },
        timeout: args.timeout.map(Duration::from),
    }
}

/// Dispatch to the selected front-end and return the process exit code.
pub async fn run(args: Cli) -> Result<i32> {
    if [args.text, args.json, args.highlight]
        .iter()
        .filter(|f| **f)
        .count()
        > 1
    {
        return Err(anyhow::anyhow!(
            "--text, --json and --highlight are mutually exclusive"
        ));
    }

    if args.highlight {
        return run_highlight(&args).await;
    }
    if args.json {
        return run_headless(args, true).await;
    }
    if !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
    }
    run_headless(args, false).await
}

/// Read FILE, or stdin when no file was given.
async fn load_source(args: &Cli) -> Result<String> {
    match args.file.as_deref() {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("failed to read source from stdin")?;
            Ok(text)
        }
    }
}

async fn run_highlight(args: &Cli) -> Result<i32> {
    let text = load_source(args).await?;
    let spans = crate::highlight::highlight(&text);
    let out = serde_json::to_string_pretty(&spans)?;
    let (out_tx, out_handle) = spawn_output_writer();
    let _ = out_tx.send(OutputLine::Stdout(out));
    drop(out_tx);
    let _ = out_handle.await;
    Ok(0)
}

/// Run once without a TUI. Text mode streams console lines; JSON mode prints the report.
async fn run_headless(args: Cli, json: bool) -> Result<i32> {
    let cfg = build_config(&args);
    let mode = args.resolve_mode();
    let text = load_source(&args).await?;
    let timeout = cfg.timeout;

    let (out_tx, out_handle) = spawn_output_writer();
    let (orch, mut events) = Orchestrator::new(cfg);
    let mut handle = orch
        .run(text, mode)
        .context("a run is already in progress")?;

    let deadline = async {
        match timeout {
            Some(d) => tokio::time::sleep(d).await,
            None => futures::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let mut timed_out = false;
    let mut interrupted = false;
    // Set once a stop is wanted; retried until a child is alive to receive it.
    let mut stop_pending = false;
    let mut retry = tokio::time::interval(Duration::from_millis(50));

    let forward = |ev: RunEvent| match ev {
        RunEvent::Line(line) if !json => {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
        RunEvent::Info(msg) => {
            let _ = out_tx.send(OutputLine::Stderr(msg));
        }
        _ => {}
    };

    let report: RunReport = loop {
        tokio::select! {
            Some(ev) = events.recv() => forward(ev),
            _ = &mut deadline, if !timed_out => {
                timed_out = true;
                info!("headless run timed out");
                orch.notify(format!(
                    "Timed out after {}",
                    humantime::format_duration(timeout.unwrap_or_default())
                ));
                stop_pending = !orch.cancel();
            }
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                orch.notify("Interrupted");
                stop_pending = !orch.cancel();
            }
            _ = retry.tick(), if stop_pending => {
                stop_pending = !orch.cancel() && !orch.state().is_idle();
            }
            res = &mut handle => break res.context("run task failed")?,
        }
    };
    // Everything the run emitted was queued before its task completed.
    while let Ok(ev) = events.try_recv() {
        forward(ev);
    }
    orch.shutdown();

    if json {
        let out = serde_json::to_string_pretty(&report)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        let summary = crate::text_summary::build_text_summary(&report);
        for line in summary.lines {
            let _ = out_tx.send(OutputLine::Stderr(line));
        }
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(report.outcome.process_exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("jvm-scratch").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_the_stock_toolchain() {
        let cli = parse(&["--text"]);
        let cfg = build_config(&cli);
        assert_eq!(cfg.workspace_dir, PathBuf::from("ide_temp_run"));
        assert_eq!(cfg.toolchain.javac, PathBuf::from("javac"));
        assert_eq!(cfg.toolchain.kotlinc, PathBuf::from("kotlinc"));
        assert!(cfg.timeout.is_none());
        assert_eq!(cli.resolve_mode(), Mode::Java);
    }

    #[test]
    fn mode_is_inferred_from_the_file_unless_given() {
        assert_eq!(parse(&["Main.kt"]).resolve_mode(), Mode::Kotlin);
        assert_eq!(
            parse(&["--mode", "java", "Main.kt"]).resolve_mode(),
            Mode::Java
        );
    }

    #[test]
    fn timeout_accepts_humantime() {
        let cli = parse(&["--text", "--timeout", "1m 30s", "Main.java"]);
        assert_eq!(build_config(&cli).timeout, Some(Duration::from_secs(90)));
    }

    #[tokio::test]
    async fn output_modes_are_exclusive() {
        let cli = parse(&["--text", "--json", "Main.java"]);
        assert!(run(cli).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn headless_run_returns_the_program_exit_code() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = crate::test_support::fake_config(tmp.path(), "touch Main.class", "exit 4", "true");
        let source = tmp.path().join("Main.java");
        std::fs::write(&source, "public class Main {}").unwrap();
        let cli = Cli {
            file: Some(source),
            mode: None,
            text: false,
            json: true,
            highlight: false,
            workspace: cfg.workspace_dir.clone(),
            javac: cfg.toolchain.javac.clone(),
            java: cfg.toolchain.java.clone(),
            kotlinc: cfg.toolchain.kotlinc.clone(),
            timeout: None,
        };
        assert_eq!(run(cli).await.unwrap(), 4);
        assert!(!cfg.workspace_dir.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn headless_timeout_cancels_the_run() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = crate::test_support::fake_config(tmp.path(), "exec sleep 30", "true", "true");
        let source = tmp.path().join("Main.java");
        std::fs::write(&source, "public class Main {}").unwrap();
        let mut cli = parse(&["--text", "--timeout", "200ms"]);
        cli.file = Some(source);
        cli.workspace = cfg.workspace_dir.clone();
        cli.javac = cfg.toolchain.javac.clone();

        let code = tokio::time::timeout(Duration::from_secs(10), run(cli))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(code, 1);
        assert!(!cfg.workspace_dir.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_requested_while_staging_lands_once_the_compiler_starts() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = crate::test_support::fake_config(tmp.path(), "exec sleep 30", "true", "true");
        let source = tmp.path().join("Main.java");
        std::fs::write(&source, "public class Main {}").unwrap();
        // Expires before the run task has spawned anything.
        let mut cli = parse(&["--json", "--timeout", "0s"]);
        cli.file = Some(source);
        cli.workspace = cfg.workspace_dir.clone();
        cli.javac = cfg.toolchain.javac.clone();

        let code = tokio::time::timeout(Duration::from_secs(10), run(cli))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(code, 1);
        assert!(!cfg.workspace_dir.exists());
    }
}
