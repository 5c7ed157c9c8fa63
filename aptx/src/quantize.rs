// aptx
// Copyright (c) 2026 The aptx Authors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The backward-adaptive differential quantizer and its inverse.
//!
//! Each sub-band carries its own [`Quantize`]/[`InvertQuantize`] pair. The two sides share no
//! state directly, but the encoder always runs its own inverse quantizer immediately after
//! quantizing (see `channel.rs`) so that its predictor tracks exactly what the decoder will
//! see, bit for bit.

use crate::fixed::{clip, clip_intp2, rshift32, rshift64, rshift64_clip24};
use crate::tables::{SubbandTables, QUANTIZATION_FACTORS};

/// The result of quantizing one sub-band's prediction error for one frame.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Quantize {
    pub(crate) quantized_sample: i32,
    pub(crate) quantized_sample_parity_change: i32,
    pub(crate) error: i64,
}

/// Largest `idx` such that `q_factor * intervals[idx] <= value << 24`, restricted to the range
/// where `intervals[idx + 1]` is still in bounds.
fn bin_search(value: i32, q_factor: i32, intervals: &[i32]) -> usize {
    let target = (value as i64) << 24;
    let mut lo = 0usize;
    let mut hi = intervals.len() - 2;
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if q_factor as i64 * intervals[mid] as i64 <= target {
            lo = mid;
        }
        else {
            hi = mid - 1;
        }
    }
    lo
}

/// Quantizes one sub-band's prediction error (`sample_diff = subband_sample - predicted_sample`)
/// against the current adaptive quantization factor.
pub(crate) fn quantize_difference(
    sample_diff: i32,
    dither: i32,
    q_factor: i32,
    tables: &SubbandTables,
) -> Quantize {
    let abs_diff = clip(sample_diff.abs(), 0, (1 << 23) - 1);
    let intervals = tables.quantize_intervals;

    let idx = bin_search(abs_diff >> 4, q_factor, intervals) as i32;

    let dither_sq = dither as i64 * dither as i64;
    let d = rshift32_clip24_helper((dither_sq >> 32) as i32) - (1 << 23);
    let d = rshift64(d as i64 * tables.quantize_dither_factors[idx as usize] as i64, 23) as i32;

    let mean = (intervals[idx as usize + 1] as i64 + intervals[idx as usize] as i64) / 2;
    let sign = if sample_diff < 0 { -1 } else { 1 };
    let interval = (intervals[idx as usize + 1] - intervals[idx as usize]) * sign;

    let dithered = rshift64_clip24(
        dither as i64 * interval as i64 + ((clip_intp2(mean as i32 + d, 23) as i64) << 32),
        32,
    );

    let error_raw = ((abs_diff as i64) << 20) - dithered as i64 * q_factor as i64;
    let error = rshift64(error_raw, 23).abs();

    let mut idx = idx;
    let mut parity_change = idx;
    if error_raw < 0 {
        idx -= 1;
    }
    else {
        parity_change -= 1;
    }

    let inv = if sample_diff < 0 { -1 } else { 0 };
    Quantize {
        quantized_sample: idx ^ inv,
        quantized_sample_parity_change: parity_change ^ inv,
        error,
    }
}

/// `rshift32_clip24` inlined at the one call site that needs it, kept as a free function so the
/// quantizer body above reads close to the specification's term-by-term layout.
fn rshift32_clip24_helper(value: i32) -> i32 {
    crate::fixed::rshift32_clip24(value, 7)
}

/// Per-sub-band adaptive inverse-quantizer state.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct InvertQuantize {
    pub(crate) quantization_factor: i32,
    pub(crate) factor_select: i32,
    pub(crate) reconstructed_difference: i32,
}

impl InvertQuantize {
    pub(crate) fn new() -> Self {
        InvertQuantize::default()
    }

    /// Reconstructs the prediction error for `quantized`, then adapts `factor_select` and
    /// `quantization_factor` for the *next* call.
    pub(crate) fn invert(&mut self, quantized: i32, dither: i32, tables: &SubbandTables) {
        let inv = if quantized < 0 { -1 } else { 0 };
        let idx = ((quantized ^ inv) + 1) as usize;

        let mut qr = tables.quantize_intervals[idx] / 2;
        if quantized < 0 {
            qr = -qr;
        }
        let qr = rshift64_clip24(
            ((qr as i64) << 32) + dither as i64 * tables.invert_quantize_dither_factors[idx] as i64,
            32,
        );

        self.reconstructed_difference = (((self.quantization_factor as i64) * qr as i64) >> 19) as i32;

        let fs = 32_620i64 * self.factor_select as i64
            + ((tables.quantize_factor_select_offset[idx] as i64) << 15);
        let fs = rshift32(fs as i32, 15);
        self.factor_select = clip(fs, 0, tables.factor_max);

        let q_idx = ((self.factor_select & 0xFF) >> 3) as usize;
        let shift = ((tables.factor_max - self.factor_select) >> 8) as u32;
        self.quantization_factor = (QUANTIZATION_FACTORS[q_idx] << 11) >> shift;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{tables_for, Subband};
    use crate::Variant;

    #[test]
    fn quantizing_zero_difference_with_zero_dither_rounds_to_the_bottom_bin() {
        let tables = tables_for(Variant::AptX, Subband::Lf);
        let q = quantize_difference(0, 0, tables.quantize_intervals[1], tables);
        assert_eq!(q.quantized_sample, 0);
    }

    #[test]
    fn sign_of_input_is_folded_into_the_quantized_index() {
        let tables = tables_for(Variant::AptX, Subband::Lf);
        let q_factor = tables.quantize_intervals[10].max(1);
        let pos = quantize_difference(50_000, 0, q_factor, tables);
        let neg = quantize_difference(-50_000, 0, q_factor, tables);
        assert!(pos.quantized_sample >= 0);
        assert!(neg.quantized_sample < 0);
    }

    #[test]
    fn invert_quantize_adapts_factor_select_within_bounds() {
        let tables = tables_for(Variant::AptX, Subband::Hf);
        let mut iq = InvertQuantize::new();
        iq.quantization_factor = 2048;
        for sample in [1, -2, 3, -1, 0] {
            iq.invert(sample, 0, tables);
            assert!(iq.factor_select >= 0 && iq.factor_select <= tables.factor_max);
        }
    }
}
