// aptx
// Copyright (c) 2026 The aptx Authors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The two-stage QMF (quadrature mirror filter) analysis and synthesis tree.
//!
//! Four PCM samples go in, four sub-band samples (LF, MLF, MHF, HF) come out on the encode
//! side, and the reverse on decode. Each stage is a two-branch 16-tap polyphase FIR; the tree
//! is built out of two such stages, an "outer" one operating on the raw PCM domain and an
//! "inner" one splitting each outer half-band further.

use crate::fixed::{clip_intp2, rshift64_clip24};
use crate::tables::{QMF_INNER_COEFFS, QMF_OUTER_COEFFS};

const FILTER_TAPS: usize = 16;

const ANALYSIS_SHIFT: u32 = 23;
const INNER_SYNTHESIS_SHIFT: u32 = 22;
const OUTER_SYNTHESIS_SHIFT: u32 = 21;

/// A single polyphase branch's circular history buffer.
///
/// The buffer is twice the filter length so that the 16 most recent samples can always be
/// read as one contiguous slice, without wraparound index arithmetic in the convolution's hot
/// loop.
#[derive(Clone)]
struct FilterSignal {
    buffer: [i32; 2 * FILTER_TAPS],
    pos: usize,
}

impl FilterSignal {
    fn new() -> Self {
        FilterSignal { buffer: [0; 2 * FILTER_TAPS], pos: 0 }
    }

    fn push(&mut self, sample: i32) {
        self.buffer[self.pos] = sample;
        self.buffer[self.pos + FILTER_TAPS] = sample;
        self.pos = (self.pos + 1) % FILTER_TAPS;
    }

    /// Convolves the last 16 pushed samples against `coeffs`, taps in forward order.
    fn convolve(&self, coeffs: &[i64; FILTER_TAPS]) -> i64 {
        let window = &self.buffer[self.pos..self.pos + FILTER_TAPS];
        let mut acc = 0i64;
        for i in 0..FILTER_TAPS {
            acc += window[i] as i64 * coeffs[i];
        }
        acc
    }

    /// Convolves against the mirror image of `coeffs` (the second branch of a filter pair).
    fn convolve_mirrored(&self, coeffs: &[i64; FILTER_TAPS]) -> i64 {
        let window = &self.buffer[self.pos..self.pos + FILTER_TAPS];
        let mut acc = 0i64;
        for i in 0..FILTER_TAPS {
            acc += window[i] as i64 * coeffs[FILTER_TAPS - 1 - i];
        }
        acc
    }
}

fn polyphase_analyze(
    branch0: &mut FilterSignal,
    branch1: &mut FilterSignal,
    coeffs: &[i64; FILTER_TAPS],
    s0: i32,
    s1: i32,
) -> (i32, i32) {
    branch0.push(s1);
    branch1.push(s0);
    let b0 = rshift64_clip24(branch0.convolve(coeffs), ANALYSIS_SHIFT);
    let b1 = rshift64_clip24(branch1.convolve_mirrored(coeffs), ANALYSIS_SHIFT);
    let low = clip_intp2(b0 + b1, 23);
    let high = clip_intp2(b0 - b1, 23);
    (low, high)
}

fn polyphase_synthesize(
    branch0: &mut FilterSignal,
    branch1: &mut FilterSignal,
    coeffs: &[i64; FILTER_TAPS],
    low: i32,
    high: i32,
    shift: u32,
) -> (i32, i32) {
    branch0.push(low - high);
    branch1.push(low + high);
    let b0 = rshift64_clip24(branch0.convolve(coeffs), shift);
    let b1 = rshift64_clip24(branch1.convolve_mirrored(coeffs), shift);
    (b0, b1)
}

/// Per-channel QMF analysis/synthesis state: one outer branch pair and two inner branch pairs.
#[derive(Clone)]
pub(crate) struct Qmf {
    outer: [FilterSignal; 2],
    inner: [[FilterSignal; 2]; 2],
}

impl Qmf {
    pub(crate) fn new() -> Self {
        Qmf {
            outer: [FilterSignal::new(), FilterSignal::new()],
            inner: [
                [FilterSignal::new(), FilterSignal::new()],
                [FilterSignal::new(), FilterSignal::new()],
            ],
        }
    }

    /// Decomposes 4 PCM samples into the 4 sub-band samples `[lf, mlf, mhf, hf]`.
    pub(crate) fn analyze(&mut self, pcm: [i32; 4]) -> [i32; 4] {
        let (low_a, high_a) =
            polyphase_analyze(&mut self.outer[0], &mut self.outer[1], &QMF_OUTER_COEFFS, pcm[0], pcm[1]);
        let (low_b, high_b) =
            polyphase_analyze(&mut self.outer[0], &mut self.outer[1], &QMF_OUTER_COEFFS, pcm[2], pcm[3]);

        let (lf, mlf) = polyphase_analyze(
            &mut self.inner[0][0],
            &mut self.inner[0][1],
            &QMF_INNER_COEFFS,
            low_a,
            low_b,
        );
        let (mhf, hf) = polyphase_analyze(
            &mut self.inner[1][0],
            &mut self.inner[1][1],
            &QMF_INNER_COEFFS,
            high_a,
            high_b,
        );

        [lf, mlf, mhf, hf]
    }

    /// Reconstructs 4 PCM samples from the 4 sub-band samples `[lf, mlf, mhf, hf]`.
    pub(crate) fn synthesize(&mut self, subbands: [i32; 4]) -> [i32; 4] {
        let [lf, mlf, mhf, hf] = subbands;

        let (low_a, low_b) = polyphase_synthesize(
            &mut self.inner[0][0],
            &mut self.inner[0][1],
            &QMF_INNER_COEFFS,
            lf,
            mlf,
            INNER_SYNTHESIS_SHIFT,
        );
        let (high_a, high_b) = polyphase_synthesize(
            &mut self.inner[1][0],
            &mut self.inner[1][1],
            &QMF_INNER_COEFFS,
            mhf,
            hf,
            INNER_SYNTHESIS_SHIFT,
        );

        let (s0, s1) = polyphase_synthesize(
            &mut self.outer[0],
            &mut self.outer[1],
            &QMF_OUTER_COEFFS,
            low_a,
            high_a,
            OUTER_SYNTHESIS_SHIFT,
        );
        let (s2, s3) = polyphase_synthesize(
            &mut self.outer[0],
            &mut self.outer[1],
            &QMF_OUTER_COEFFS,
            low_b,
            high_b,
            OUTER_SYNTHESIS_SHIFT,
        );

        [s0, s1, s2, s3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_signal_doubled_buffer_invariant_holds() {
        let mut fs = FilterSignal::new();
        for i in 0..40 {
            fs.push(i);
            for k in 0..FILTER_TAPS {
                assert_eq!(fs.buffer[k], fs.buffer[k + FILTER_TAPS]);
            }
        }
    }

    #[test]
    fn silence_in_produces_silence_out() {
        let mut qmf = Qmf::new();
        for _ in 0..200 {
            let subbands = qmf.analyze([0, 0, 0, 0]);
            assert_eq!(subbands, [0, 0, 0, 0]);
        }
    }

    #[test]
    fn analyze_then_synthesize_is_stable_on_silence() {
        let mut analyzer = Qmf::new();
        let mut synth = Qmf::new();
        for _ in 0..64 {
            let subbands = analyzer.analyze([0, 0, 0, 0]);
            let pcm = synth.synthesize(subbands);
            assert_eq!(pcm, [0, 0, 0, 0]);
        }
    }
}
