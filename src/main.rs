//! ubitlink: frame a raw micro:bit byte stream into messages.
//!
//! ```text
//! ubitlink [FILE] [--delimiter BYTE]
//! ```
//!
//! Reads raw bytes from `FILE` (or stdin when absent or `-`), splits them
//! on the delimiter exactly as a live link would, and prints one decoded
//! message per line.  Point it at a serial device node or a captured
//! transcript:
//!
//! ```text
//! stty -F /dev/ttyACM0 115200 raw && ubitlink /dev/ttyACM0
//! ```
#![deny(unused_must_use)]

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use ubitlink::link::FrameDecoder;

const READ_CHUNK: usize = 4096;

#[derive(Parser, Debug)]
#[command(name = "ubitlink", version, about, long_about = None)]
struct Args {
    /// Raw input: a serial device node or a captured transcript.  Reads
    /// stdin when absent or `-`.
    input: Option<PathBuf>,

    /// Message delimiter: `\n`, `lf`, `\r`, `cr`, one character, `0xHH` or
    /// a decimal byte.
    #[arg(short, long, default_value = "lf", value_parser = parse_delimiter)]
    delimiter: u8,
}

fn parse_delimiter(text: &str) -> Result<u8, String> {
    let parsed = match text {
        "\\n" | "lf" => Some(b'\n'),
        "\\r" | "cr" => Some(b'\r'),
        _ if text.len() == 1 => Some(text.as_bytes()[0]),
        _ => text
            .strip_prefix("0x")
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .or_else(|| text.parse::<u8>().ok()),
    };
    parsed.ok_or_else(|| format!("invalid delimiter {text:?}"))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let mut input: Box<dyn Read> = match &args.input {
        Some(path) if path.as_os_str() != "-" => Box::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        ),
        _ => Box::new(io::stdin().lock()),
    };
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let mut decoder = FrameDecoder::with_delimiter(args.delimiter);
    let mut buf = [0u8; READ_CHUNK];
    let mut total = 0usize;
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("reading input"),
        };
        total += n;
        debug!("read {} bytes", n);
        for message in decoder.feed(&buf[..n]) {
            writeln!(out, "{message}")?;
        }
        out.flush()?;
    }

    info!(
        "{} bytes, {} malformed tokens, {} unterminated bytes discarded",
        total,
        decoder.malformed_count(),
        decoder.pending().len()
    );
    Ok(())
}
