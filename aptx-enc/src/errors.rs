// aptx-enc
// Copyright (c) 2026 The aptx Authors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

/// `CliError` enumerates everything that can send this binary to a nonzero exit code.
///
/// There is no decode-time failure mode here (this binary only encodes), so the only things
/// that can go wrong are I/O failures and a PCM input whose length isn't a whole number of
/// frames.
#[derive(Debug)]
pub enum CliError {
    Io(std::io::Error),
    TruncatedFrame { leftover_bytes: usize },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io(err) => write!(f, "io error: {err}"),
            CliError::TruncatedFrame { leftover_bytes } => {
                write!(f, "input ended with {leftover_bytes} bytes that don't form a whole PCM frame")
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io(err) => Some(err),
            CliError::TruncatedFrame { .. } => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err)
    }
}
