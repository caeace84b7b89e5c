use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use viv_cmdstream::DiffSession;

/// Compare two captured GPU command streams draw by draw.
///
/// Both streams are replayed into a register file; at every draw the two
/// files are compared after masking buffer addresses and counters that
/// legitimately differ between runs.  Differences go to stdout and do not
/// affect the exit status: 0 is a completed run, 1 a usage error, 2 a stream
/// that could not be opened or decoded.
#[derive(Debug, Parser)]
#[command(name = "viv-cmd-diff", version)]
struct Cli {
    /// First captured command stream.
    left: PathBuf,
    /// Second captured command stream.
    right: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Usage problems exit 1; --help and --version exit 0.
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            process::exit(code);
        }
    };

    if let Err(err) = run(&cli) {
        eprintln!("viv-cmd-diff: {err:#}");
        process::exit(2);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let left = File::open(&cli.left).with_context(|| format!("open {}", cli.left.display()))?;
    let right = File::open(&cli.right).with_context(|| format!("open {}", cli.right.display()))?;

    let mut session = DiffSession::new(
        cli.left.display().to_string(),
        BufReader::new(left),
        cli.right.display().to_string(),
        BufReader::new(right),
    );

    let stdout = io::stdout();
    let mut report = stdout.lock();
    let summary = session.run(&mut report)?;
    report.flush()?;

    tracing::debug!(
        draws = summary.draws_compared,
        state_diffs = summary.draws_with_state_diffs,
        draw_op_diffs = summary.draw_op_mismatches,
        "comparison finished"
    );
    Ok(())
}
