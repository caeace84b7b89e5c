use std::process;

use clap::Parser;

mod params;

#[cfg(target_os = "linux")]
mod drm;

/// Print the identity of every etnaviv GPU core on this machine.
///
/// Scans the DRM render nodes for the etnaviv driver and queries each
/// exposed pipe for its model, revision and feature words.
#[derive(Debug, Parser)]
#[command(name = "viv-info", version)]
struct Cli {}

fn main() {
    let _cli = Cli::parse();
    if let Err(err) = run() {
        eprintln!("viv-info: {err:#}");
        process::exit(1);
    }
}

#[cfg(target_os = "linux")]
fn run() -> anyhow::Result<()> {
    use anyhow::Context;

    let mut device = drm::open_etnaviv().context("no etnaviv render node found")?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    params::write_gpu_report(&mut out, &mut device)?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn run() -> anyhow::Result<()> {
    anyhow::bail!("the etnaviv DRM interface is only available on Linux")
}
