use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use fat16_shuffle::{Fat16Volume, mapped};

const USAGE: &str = "\
usage: fatshuffle [--offset N] [--debug] <image>

Randomly permute the physical clusters of a FAT16 image in place.

options:
  --offset N   byte offset of the volume inside the image (decimal or 0x hex, default 0)
  --debug      list geometry and every file's cluster chain instead of shuffling
  -h, --help   show this help

Set RUST_LOG=info for progress messages.
";

#[derive(Debug, PartialEq, Eq)]
struct Options {
    image: PathBuf,
    offset: usize,
    debug: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Some(options) = parse_args(env::args().skip(1))? else {
        print!("{USAGE}");
        return Ok(());
    };

    if options.debug {
        dump(&options)
    } else {
        shuffle(&options)
    }
}

fn dump(options: &Options) -> Result<()> {
    let map = mapped::map_read_only(&options.image)
        .with_context(|| format!("failed to open {}", options.image.display()))?;
    let volume = Fat16Volume::open(&map[..], options.offset)
        .with_context(|| format!("failed to read FAT16 volume at offset {}", options.offset))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    volume.dump(&mut out)?;
    out.flush()?;
    Ok(())
}

fn shuffle(options: &Options) -> Result<()> {
    let mut map = mapped::map_read_write(&options.image)
        .with_context(|| format!("failed to open {}", options.image.display()))?;

    let report = {
        let mut volume = Fat16Volume::open(&mut map[..], options.offset).with_context(|| {
            format!("failed to read FAT16 volume at offset {}", options.offset)
        })?;
        volume.shuffle_clusters().context("shuffle aborted")?
    };
    map.flush()
        .with_context(|| format!("failed to write back {}", options.image.display()))?;

    log::info!(
        "{}: {} of {} clusters moved, {} subdirectories updated",
        options.image.display(),
        report.moved,
        report.clusters,
        report.directories
    );
    Ok(())
}

/// `Ok(None)` when help was requested
fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Option<Options>> {
    let mut args = args.into_iter();
    let mut image = None;
    let mut offset = 0;
    let mut debug = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--debug" => debug = true,
            "--offset" => {
                let Some(value) = args.next() else {
                    bail!("--offset requires a value");
                };
                offset = parse_offset(&value)?;
            }
            _ if arg.starts_with("--offset=") => {
                offset = parse_offset(&arg["--offset=".len()..])?;
            }
            _ if arg.starts_with('-') && arg.len() > 1 => bail!("unknown option '{arg}'"),
            _ => {
                if image.is_some() {
                    bail!("unexpected argument '{arg}'");
                }
                image = Some(PathBuf::from(arg));
            }
        }
    }

    let Some(image) = image else {
        bail!("missing image path\n\n{USAGE}");
    };
    Ok(Some(Options {
        image,
        offset,
        debug,
    }))
}

fn parse_offset(value: &str) -> Result<usize> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.with_context(|| format!("invalid offset '{value}'"))
}
