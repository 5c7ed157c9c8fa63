// aptx
// Copyright (c) 2026 The aptx Authors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-sub-band dither generation.
//!
//! Each frame's dither values (and the dither parity bit folded into the cross-channel parity
//! check) are derived from a rolling history of the *previous* frame's quantized sub-band
//! indices, not from any external noise source. This makes dither reproducible and part of
//! the decodable state rather than a randomness the decoder would need to share out of band.

use crate::tables::SUBBAND_COUNT;

/// The four per-sub-band dither values plus the dither parity bit for one frame.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Dither {
    pub(crate) values: [i32; SUBBAND_COUNT],
    pub(crate) parity: bool,
}

/// Rolling codeword-history state used to derive each frame's [`Dither`].
#[derive(Clone, Default)]
pub(crate) struct DitherGenerator {
    codeword_history: u32,
}

impl DitherGenerator {
    pub(crate) fn new() -> Self {
        DitherGenerator { codeword_history: 0 }
    }

    /// Advances the codeword history using the previous frame's quantized sub-band samples,
    /// then derives this frame's dither values and parity from it.
    pub(crate) fn generate(&mut self, prev_quantized: [i32; SUBBAND_COUNT]) -> Dither {
        let [q0, q1, q2, q3] = prev_quantized;
        let cw = (q0 & 3) | ((q1 & 2) << 1) | ((q2 & 1) << 3);

        self.codeword_history =
            ((cw as u32) << 8).wrapping_add(self.codeword_history << 4);

        let m = 5_184_443i64 * (self.codeword_history >> 7) as i64;
        let d = (m.wrapping_mul(4).wrapping_add(m >> 22)) as i32;

        let mut values = [0i32; SUBBAND_COUNT];
        for (subband, value) in values.iter_mut().enumerate() {
            let shift = 23 - 5 * subband as u32;
            *value = ((d as u32) << shift) as i32;
        }

        Dither { values, parity: (d >> 25) & 1 != 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_history_produces_a_fixed_point() {
        let mut gen = DitherGenerator::new();
        let first = gen.generate([0, 0, 0, 0]);
        let second = gen.generate([0, 0, 0, 0]);
        // With an all-zero quantized history the codeword history converges to a repeating
        // value, so the dither sequence it drives also repeats from the second frame on.
        assert_eq!(first.values, second.values);
        assert_eq!(first.parity, second.parity);
    }

    #[test]
    fn codeword_bits_are_taken_from_the_expected_positions() {
        let mut gen = DitherGenerator::new();
        let a = gen.generate([1, 0, 0, 0]);
        let mut gen2 = DitherGenerator::new();
        let b = gen2.generate([0, 0, 0, 0]);
        assert_ne!(a.values, b.values);
    }
}
