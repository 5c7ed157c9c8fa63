// aptx-enc
// Copyright (c) 2026 The aptx Authors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![forbid(unsafe_code)]

//! Thin command-line aptX / aptX HD encoder.
//!
//! Reads raw little-endian 24-bit signed interleaved stereo PCM from stdin or a file, and
//! writes the encoded aptX (or aptX HD) codeword stream to stdout or a file. All of the DSP
//! lives in the `aptx` library; this binary is nothing but stdin/stdout plumbing and argument
//! parsing, per the core specification's "external collaborators" scope.

mod errors;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::process::ExitCode;

use clap::{Arg, ArgAction, Command};

use aptx::{Context, Variant};
use errors::CliError;

/// One PCM frame: 4 samples, 2 channels, 3 bytes each.
const PCM_FRAME_BYTES: usize = 4 * 2 * 3;

/// How many PCM frames to read from the input at a time.
const FRAMES_PER_CHUNK: usize = 4096;

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

fn encode(variant: Variant, input: &mut dyn Read, output: &mut dyn Write) -> Result<(), CliError> {
    let mut ctx = Context::new(variant);

    let mut read_buf = vec![0u8; PCM_FRAME_BYTES * FRAMES_PER_CHUNK];
    let mut pending_len = 0usize;
    let mut out_buf = vec![0u8; read_buf.len()];

    loop {
        let n = input.read(&mut read_buf[pending_len..])?;
        if n == 0 {
            break;
        }
        pending_len += n;

        let mut consumed_total = 0;
        while consumed_total < pending_len {
            let (consumed, written) = ctx.encode(&read_buf[consumed_total..pending_len], &mut out_buf);
            if consumed == 0 {
                break;
            }
            output.write_all(&out_buf[..written])?;
            consumed_total += consumed;
        }
        read_buf.copy_within(consumed_total..pending_len, 0);
        pending_len -= consumed_total;
    }

    if pending_len != 0 {
        return Err(CliError::TruncatedFrame { leftover_bytes: pending_len });
    }

    loop {
        let (written, done) = ctx.encode_finish(&mut out_buf);
        output.write_all(&out_buf[..written])?;
        if done {
            break;
        }
    }

    output.flush()?;
    Ok(())
}

fn run() -> Result<(), CliError> {
    let version = format!("{}.{}.{}", aptx::version::MAJOR, aptx::version::MINOR, aptx::version::PATCH);
    let matches = Command::new("aptx-enc")
        .version(version)
        .about("Encodes raw 24-bit PCM to aptX or aptX HD")
        .arg(Arg::new("hd").long("hd").action(ArgAction::SetTrue).help("Encode as aptX HD instead of aptX"))
        .arg(Arg::new("input").long("input").short('i').default_value("-").help("Input PCM path, or - for stdin"))
        .arg(Arg::new("output").long("output").short('o').default_value("-").help("Output path, or - for stdout"))
        .get_matches();

    let variant = if matches.get_flag("hd") { Variant::AptxHd } else { Variant::AptX };
    let input_path = matches.get_one::<String>("input").expect("has a default");
    let output_path = matches.get_one::<String>("output").expect("has a default");

    let mut input = open_input(input_path)?;
    let mut output = open_output(output_path)?;

    encode(variant, &mut *input, &mut *output)
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("aptx-enc: {err}");
            ExitCode::FAILURE
        }
    }
}
