mod cli;
mod console;
mod error;
mod highlight;
mod logging;
mod model;
mod orchestrator;
mod pipeline;
mod text_summary;
#[cfg(all(test, unix))]
mod test_support;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let target = if args.is_headless() {
        logging::LogTarget::Stderr
    } else {
        logging::LogTarget::File
    };
    if let Err(e) = logging::init(target) {
        eprintln!("warning: logging disabled: {e:#}");
    }

    match cli::run(args).await {
        // Exit explicitly: a program's orphaned children may still hold the
        // output pipe, and runtime shutdown would wait on the reader thread.
        Ok(code) => std::process::exit(code),
        Err(e) => Err(e),
    }
}
