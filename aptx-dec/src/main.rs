// aptx-dec
// Copyright (c) 2026 The aptx Authors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![forbid(unsafe_code)]

//! Thin command-line aptX / aptX HD decoder.
//!
//! Sniffs the input's variant from its first bytes (see `sniff.rs`), then decodes to raw
//! little-endian 24-bit signed interleaved stereo PCM on stdout (or a file). By default this
//! uses [`Context::decode_sync`], which tolerates single-byte drops or insertions anywhere in
//! the stream; `--no-sync` switches to the plain [`Context::decode`] path, which stops at the
//! first parity failure, for comparing the two or debugging a specific corruption.

mod errors;
mod sniff;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::process::ExitCode;

use clap::{Arg, ArgAction, Command};

use aptx::{Context, Variant};
use errors::CliError;

/// How many codeword pairs to read from the input at a time.
const FRAMES_PER_CHUNK: usize = 4096;

/// Longest prefix either variant's silence marker can take.
const SNIFF_LEN: usize = 6;

fn open_input(path: &str) -> io::Result<Box<dyn Read>> {
    if path == "-" {
        Ok(Box::new(io::stdin()))
    }
    else {
        Ok(Box::new(BufReader::new(File::open(Path::new(path))?)))
    }
}

fn open_output(path: &str) -> io::Result<Box<dyn Write>> {
    if path == "-" {
        Ok(Box::new(io::stdout()))
    }
    else {
        Ok(Box::new(BufWriter::new(File::create(Path::new(path))?)))
    }
}

/// Bytes of decoded PCM output one byte of codeword input can produce, rounded up: 6 for aptX
/// (6:1 compression), 4 for aptX HD (4:1).
fn pcm_to_codeword_ratio(variant: Variant) -> usize {
    match variant {
        Variant::AptX => 6,
        Variant::AptxHd => 4,
    }
}

fn codeword_pair_bytes(variant: Variant) -> usize {
    match variant {
        Variant::AptX => 4,
        Variant::AptxHd => 6,
    }
}

/// Reads enough of `input` to sniff its variant, returning the guessed (or forced) variant and
/// whatever bytes were read in the process — they're still part of the stream and must be fed
/// to the decoder.
fn detect_variant(input: &mut dyn Read, forced: Option<Variant>) -> Result<(Variant, Vec<u8>), CliError> {
    let mut prefix = vec![0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = input.read(&mut prefix[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    prefix.truncate(filled);

    let variant = match forced {
        Some(v) => v,
        None => sniff::guess_variant(&prefix).ok_or(CliError::UnrecognizedPrefix)?,
    };
    Ok((variant, prefix))
}

fn decode_plain(variant: Variant, mut leading: Vec<u8>, input: &mut dyn Read, output: &mut dyn Write) -> Result<(), CliError> {
    let mut ctx = Context::new(variant);
    let pair_bytes = codeword_pair_bytes(variant);
    let ratio = pcm_to_codeword_ratio(variant);

    let mut read_buf = vec![0u8; pair_bytes * FRAMES_PER_CHUNK];
    let mut out_buf = vec![0u8; read_buf.len() * ratio + 24];
    let mut total_consumed = 0usize;

    loop {
        let pending_len = if !leading.is_empty() {
            let n = leading.len().min(read_buf.len());
            read_buf[..n].copy_from_slice(&leading[..n]);
            leading.drain(..n);
            n
        }
        else {
            match input.read(&mut read_buf)? {
                0 => break,
                n => n,
            }
        };

        let (consumed, written) = ctx.decode(&read_buf[..pending_len], &mut out_buf);
        output.write_all(&out_buf[..written])?;
        total_consumed += consumed;

        if consumed < pending_len {
            return Err(CliError::ParityMismatch { consumed: total_consumed });
        }
    }

    output.flush()?;
    Ok(())
}

fn decode_sync(variant: Variant, mut leading: Vec<u8>, input: &mut dyn Read, output: &mut dyn Write) -> Result<(), CliError> {
    let mut ctx = Context::new(variant);
    let pair_bytes = codeword_pair_bytes(variant);
    let ratio = pcm_to_codeword_ratio(variant);

    let mut read_buf = vec![0u8; pair_bytes * FRAMES_PER_CHUNK];
    let mut out_buf = vec![0u8; read_buf.len() * ratio + 24];

    loop {
        let pending_len = if !leading.is_empty() {
            let n = leading.len().min(read_buf.len());
            read_buf[..n].copy_from_slice(&leading[..n]);
            leading.drain(..n);
            n
        }
        else {
            match input.read(&mut read_buf)? {
                0 => break,
                n => n,
            }
        };

        let mut consumed_total = 0;
        while consumed_total < pending_len {
            let (consumed, written, synced, dropped) =
                ctx.decode_sync(&read_buf[consumed_total..pending_len], &mut out_buf);
            output.write_all(&out_buf[..written])?;
            if dropped > 0 {
                log::warn!("resynchronized after dropping {dropped} byte(s); synced={synced}");
            }
            if consumed == 0 && written == 0 {
                break;
            }
            consumed_total += consumed;
        }
    }

    let cached = ctx.decode_sync_finish();
    if cached > 0 {
        log::debug!("discarding {cached} trailing byte(s) that never formed a whole codeword");
    }

    output.flush()?;
    Ok(())
}

fn run() -> Result<(), CliError> {
    let matches = Command::new("aptx-dec")
        .version(format!("{}.{}.{}", aptx::version::MAJOR, aptx::version::MINOR, aptx::version::PATCH))
        .about("Decodes an aptX or aptX HD stream to raw 24-bit PCM")
        .arg(Arg::new("hd").long("hd").action(ArgAction::SetTrue).help("Force aptX HD framing"))
        .arg(Arg::new("aptx").long("aptx").action(ArgAction::SetTrue).help("Force plain aptX framing"))
        .arg(
            Arg::new("no-sync")
                .long("no-sync")
                .action(ArgAction::SetTrue)
                .help("Use the plain (non-recovering) decode path instead of auto-sync"),
        )
        .arg(Arg::new("input").long("input").short('i').default_value("-").help("Input path, or - for stdin"))
        .arg(Arg::new("output").long("output").short('o').default_value("-").help("Output path, or - for stdout"))
        .get_matches();

    let forced = if matches.get_flag("hd") {
        Some(Variant::AptxHd)
    }
    else if matches.get_flag("aptx") {
        Some(Variant::AptX)
    }
    else {
        None
    };
    let no_sync = matches.get_flag("no-sync");
    let input_path = matches.get_one::<String>("input").expect("has a default");
    let output_path = matches.get_one::<String>("output").expect("has a default");

    let mut input = open_input(input_path)?;
    let mut output = open_output(output_path)?;

    let (variant, leading) = detect_variant(&mut *input, forced)?;
    log::debug!("decoding as {variant:?}");

    if no_sync {
        decode_plain(variant, leading, &mut *input, &mut *output)
    }
    else {
        decode_sync(variant, leading, &mut *input, &mut *output)
    }
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("aptx-dec: {err}");
            ExitCode::FAILURE
        }
    }
}
