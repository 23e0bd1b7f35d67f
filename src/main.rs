use phasefile::{translate_x, FileReader, FileWriter, ZWindow};

use clap::error::ErrorKind;
use clap::Parser;

use anyhow::Result;
use log::info;

use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(
    name = "pftransx",
    about = "Translate the x position of particles inside a z window",
    allow_negative_numbers = true
)]
struct Args {
    /// Input particle file (plain or gzip-compressed)
    input: PathBuf,
    /// Output particle file (created, uncompressed)
    output: PathBuf,
    /// Lower z bound, excluded
    zmin: f64,
    /// Upper z bound, excluded
    zmax: f64,
    /// Offset added to x for particles inside the window
    dx: f64,
}

// parse here to keep main clean; usage problems exit 1 before any file I/O
fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.kind() == ErrorKind::DisplayHelp || e.kind() == ErrorKind::DisplayVersion => {
            e.exit()
        }
        Err(e) => {
            println!("{e}");
            process::exit(1);
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = parse_args();

    let mut reader = FileReader::open(&args.input)?;
    let mut writer = FileWriter::create(&args.output)?;
    writer.transfer_metadata(&reader)?;
    writer.add_comment(&format!(
        "Translated x by {} for particles with {} < z < {}",
        args.dx, args.zmin, args.zmax
    ))?;

    let window = ZWindow {
        zmin: args.zmin,
        zmax: args.zmax,
    };
    let stats = translate_x(&mut reader, &mut writer, window, args.dx)?;
    let written = writer.close()?;

    info!(
        "{} -> {}: {} particles copied, {} translated",
        args.input.display(),
        args.output.display(),
        written,
        stats.translated
    );
    Ok(())
}
