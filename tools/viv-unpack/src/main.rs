use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use viv_unpack::CoreDump;

/// Unpack an etnaviv devcoredump into its captured buffers.
///
/// Prints the register dump and buffer table to stdout, writes each buffer
/// to the output directory, and cross-checks the captured MMU page table
/// against the BO map.  Exits 1 on usage or I/O problems, 2 on an invalid
/// dump, 3 when the dump carries no buffers.
#[derive(Debug, Parser)]
#[command(name = "viv-unpack", version)]
struct Cli {
    /// Devcoredump blob, as written by the kernel.
    dump: PathBuf,
    /// Directory the buffers are extracted into.
    dir: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            process::exit(code);
        }
    };

    let bytes = match fs::read(&cli.dump) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("viv-unpack: {}: {err}", cli.dump.display());
            process::exit(1);
        }
    };

    let dump = match CoreDump::parse(bytes) {
        Ok(dump) => dump,
        Err(err) => {
            eprintln!("viv-unpack: {}: {err}", cli.dump.display());
            process::exit(2);
        }
    };

    if dump.buffers().is_empty() {
        eprintln!("viv-unpack: {}: no buffers", cli.dump.display());
        process::exit(3);
    }

    if let Err(err) = run(&cli, &dump) {
        eprintln!("viv-unpack: {err:#}");
        process::exit(2);
    }
}

fn run(cli: &Cli, dump: &CoreDump) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Some(regs) = dump.registers() {
        writeln!(out, "=== Register dump")?;
        for r in &regs {
            match viv_unpack::annotate_register(r.reg, r.value) {
                Some(note) => writeln!(out, "{:08x} = {:08x} {note}", r.reg, r.value)?,
                None => writeln!(out, "{:08x} = {:08x}", r.reg, r.value)?,
            }
        }
    }

    let active = dump.active_buffer();
    writeln!(out, "=== Buffers")?;
    writeln!(out, " {:<3} {:<5} {:<8} {:<8}", "Num", "Name", "IOVA", "Size")?;
    for (i, buffer) in dump.buffers().iter().enumerate() {
        let marker = if Some(i) == active { '*' } else { ' ' };
        writeln!(
            out,
            "{marker}{i:3} {:<5} {:08x} {:08x} {:8}",
            buffer.kind.name(),
            buffer.iova,
            buffer.file_size,
            buffer.file_size,
        )?;
    }

    fs::create_dir_all(&cli.dir).with_context(|| format!("create {}", cli.dir.display()))?;
    dump.extract_to(&cli.dir)
        .with_context(|| format!("extract to {}", cli.dir.display()))?;

    if let Some(mismatches) = dump.check_mmu()? {
        write!(out, "Checking MMU entries...")?;
        if mismatches.is_empty() {
            writeln!(out, " ok")?;
        } else {
            writeln!(out, " failed")?;
            for m in &mismatches {
                writeln!(
                    out,
                    "Buf {} Offset {:08x}: {:08x} {:08x}",
                    m.buffer, m.offset, m.mmu_entry, m.bomap_entry
                )?;
            }
        }
    }
    Ok(())
}
