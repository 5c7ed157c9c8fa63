// aptx
// Copyright (c) 2026 The aptx Authors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cross-channel parity: the mechanism that lets a decoder confirm it is still aligned on
//! frame boundaries, and resynchronize if it isn't.
//!
//! Every [`SYNC_FRAME_INTERVAL`]th frame, the encoder forces the *combined* L/R forward parity
//! bit to 1 (it is 0 on every other frame) by nudging whichever sub-band, in either channel,
//! is cheapest to perturb (the one with the smallest quantization error this frame) to its
//! parity-flipped neighbor. The decoder checks the same combined bit on the same cadence; a
//! mismatch means a byte has been dropped or inserted somewhere upstream. A single `sync_idx`
//! counter (0..7, owned by the [`crate::Context`], not by either channel) drives the cadence
//! for both `insert_sync` and `check_parity`.

use crate::tables::SUBBAND_COUNT;

/// Forward parity is forced to 1 once every this many frames.
pub(crate) const SYNC_FRAME_INTERVAL: u32 = 8;

/// Sub-bands are examined in this order (not index order) when picking which one to perturb
/// to fix parity: MLF, MHF, LF, HF.
const SCAN_ORDER: [usize; SUBBAND_COUNT] = [1, 2, 0, 3];

/// One channel's inputs to the cross-channel parity check/fix for a single frame.
#[derive(Clone, Copy)]
pub(crate) struct ChannelParityInput {
    pub(crate) dither_parity: bool,
    pub(crate) quantized: [i32; SUBBAND_COUNT],
    pub(crate) parity_change: [i32; SUBBAND_COUNT],
    pub(crate) error: [i64; SUBBAND_COUNT],
}

fn required_parity(sync_idx: u32) -> bool {
    sync_idx == SYNC_FRAME_INTERVAL - 1
}

/// Advances the shared sync counter to the next frame's value.
pub(crate) fn advance_sync_idx(sync_idx: u32) -> u32 {
    (sync_idx + 1) % SYNC_FRAME_INTERVAL
}

/// The forward parity bit for one channel: the dither parity XORed with every sub-band's
/// quantized sample. This is also literally the bit transmitted in place of the HF sub-band's
/// natural sign bit (see `pack::pack_codeword`), so it is computed identically whether it is
/// about to be checked, forced, or packed.
pub(crate) fn quantized_parity(dither_parity: bool, quantized: [i32; SUBBAND_COUNT]) -> bool {
    let mut parity = dither_parity as i32;
    for q in quantized {
        parity ^= q;
    }
    parity & 1 != 0
}

/// If the combined L/R parity doesn't match what this frame requires, swaps one sub-band's
/// quantized sample (in whichever channel has the least-distorted candidate) for its
/// parity-flipped alternative. Scans `{right, left}` outer, `{MLF, MHF, LF, HF}` inner,
/// keeping the first strictly-smallest error seen.
pub(crate) fn insert_sync(sync_idx: u32, right: &mut ChannelParityInput, left: &mut ChannelParityInput) {
    let combined = quantized_parity(left.dither_parity, left.quantized)
        ^ quantized_parity(right.dither_parity, right.quantized);
    if combined != required_parity(sync_idx) {
        let mut best: Option<(bool, usize, i64)> = None;
        for (is_right, ch) in [(true, &*right), (false, &*left)] {
            for &sb in &SCAN_ORDER {
                let err = ch.error[sb];
                if best.map_or(true, |(_, _, best_err)| err < best_err) {
                    best = Some((is_right, sb, err));
                }
            }
        }
        let (is_right, sb, _) = best.expect("four sub-bands always yield a candidate");
        if is_right {
            right.quantized[sb] = right.parity_change[sb];
        }
        else {
            left.quantized[sb] = left.parity_change[sb];
        }
    }
}

/// Checks the combined L/R forward parity bit for one frame. Returns `true` on a mismatch
/// (the caller's signal to treat the frame as corrupt).
pub(crate) fn check_parity(
    sync_idx: u32,
    left_dither_parity: bool,
    left_quantized: [i32; SUBBAND_COUNT],
    right_dither_parity: bool,
    right_quantized: [i32; SUBBAND_COUNT],
) -> bool {
    let combined =
        quantized_parity(left_dither_parity, left_quantized) ^ quantized_parity(right_dither_parity, right_quantized);
    combined != required_parity(sync_idx)
}
