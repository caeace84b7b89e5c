use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser};

/// Reorder a tiled framebuffer or texture dump into linear scanlines.
///
/// Reads 32-bit pixels in the GPU's 4x4 tile layout and writes the linear
/// image to stdout.
#[derive(Debug, Parser)]
#[command(name = "viv-detile", version, disable_help_flag = true)]
struct Cli {
    /// Image width in pixels.
    #[arg(short, long)]
    width: usize,

    /// Image height in pixels; derived from the input size when omitted.
    #[arg(short, long)]
    height: Option<usize>,

    /// Input is supertiled (two pixel pipes interleaved).
    #[arg(short, long)]
    multitile: bool,

    /// Tiled input file; stdin when omitted.
    file: Option<PathBuf>,

    #[arg(long, action = ArgAction::HelpLong)]
    help: Option<bool>,
}

/// Pixel size in bytes; dumps are RGBA or BGRA.
const PIXEL_BYTES: usize = 4;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            process::exit(code);
        }
    };

    if let Err(err) = run(&cli) {
        eprintln!("viv-detile: {err:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let data = match &cli.file {
        Some(path) => fs::read(path).with_context(|| format!("read {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .lock()
                .read_to_end(&mut buf)
                .context("read stdin")?;
            buf
        }
    };

    if cli.width == 0 {
        bail!("width must be positive");
    }
    let height = match cli.height {
        Some(height) => height,
        None => data.len() / (cli.width * PIXEL_BYTES),
    };

    let size = cli
        .width
        .checked_mul(height)
        .and_then(|px| px.checked_mul(PIXEL_BYTES))
        .context("image size overflows")?;
    if size > data.len() {
        bail!(
            "{}x{height} pixels need {size} bytes, input has {}",
            cli.width,
            data.len()
        );
    }

    let mut out = vec![0u8; size];
    if cli.multitile {
        viv_detile::demultitile(&mut out, &data, PIXEL_BYTES, cli.width, height)?;
    } else {
        viv_detile::detile(&mut out, &data, PIXEL_BYTES, cli.width, height)?;
    }

    io::stdout()
        .lock()
        .write_all(&out)
        .context("write output")?;
    Ok(())
}
