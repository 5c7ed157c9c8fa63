// aptx-dec
// Copyright (c) 2026 The aptx Authors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stream-type heuristic sniffing: guess whether a headerless codeword stream is aptX or
//! aptX HD from its first few bytes, per spec.md §1's "out of scope (external collaborators)"
//! list. This is a CLI convenience, not a DSP decision; a stream that doesn't start from
//! silence (or from a freshly reset encoder) won't match either prefix, and the caller must
//! fall back to an explicit `--hd`/`--aptx` flag.

use aptx::{Variant, APTX_HD_SILENCE_PREFIX, APTX_SILENCE_PREFIX};

/// Guesses the variant of `prefix` (the stream's first bytes), if it starts with either
/// published silence prefix. Checks aptX HD first since its prefix is a strict byte-length
/// superset scenario away from colliding with aptX's (they share no leading bytes, but aptX's
/// shorter prefix is checked second purely so a truncated read of an aptX HD stream that
/// happens to also satisfy the 4-byte aptX prefix never arises — it can't, since the prefixes
/// differ from their first byte, but checking the longer one first keeps the order obviously
/// correct to a reader).
pub fn guess_variant(prefix: &[u8]) -> Option<Variant> {
    if prefix.starts_with(&APTX_HD_SILENCE_PREFIX) {
        Some(Variant::AptxHd)
    }
    else if prefix.starts_with(&APTX_SILENCE_PREFIX) {
        Some(Variant::AptX)
    }
    else {
        None
    }
}
