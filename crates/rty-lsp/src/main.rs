//! The language-server binary.
//!
//! Speaks framed JSON-RPC on stdio; logs go to stderr so they never mix
//! with the protocol stream.

use anyhow::Result;
use clap::Parser;
use rty_lsp::LspLoop;
use rty_pipeline::{Opts, Workers};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Incremental type-checker language server.
#[derive(Parser, Debug)]
#[command(name = "rty-lsp", version, about)]
struct Cli {
    /// Input files for the initial index.
    #[arg(value_name = "FILE")]
    files: Vec<String>,

    /// Worker-pool size; defaults to the number of cores.
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::TRACE } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let opts = Opts {
        input_file_names: cli.files,
        jobs: cli.jobs,
    };
    let workers = Workers::new(opts.jobs)?;

    let stdin = std::io::stdin().lock();
    let stdout = std::io::stdout().lock();
    let mut server = LspLoop::new(opts, workers, stdin, stdout);
    server.run()?;
    Ok(())
}
