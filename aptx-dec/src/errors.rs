// aptx-dec
// Copyright (c) 2026 The aptx Authors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

/// `CliError` enumerates everything that can send this binary to a nonzero exit code.
#[derive(Debug)]
pub enum CliError {
    Io(std::io::Error),
    /// The input didn't begin with either variant's published silence prefix, and `--hd`/`--aptx`
    /// wasn't given to force one.
    UnrecognizedPrefix,
    /// Plain (non-resynchronizing) decode hit a parity mismatch and stopped.
    ParityMismatch { consumed: usize },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io(err) => write!(f, "io error: {err}"),
            CliError::UnrecognizedPrefix => {
                write!(f, "input doesn't start with a recognized aptX or aptX HD prefix; pass --hd or --aptx to force a variant")
            }
            CliError::ParityMismatch { consumed } => {
                write!(f, "parity check failed after decoding {consumed} input bytes; stream is corrupt from this point (try without --no-sync)")
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io(err) => Some(err),
            CliError::UnrecognizedPrefix | CliError::ParityMismatch { .. } => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err)
    }
}
