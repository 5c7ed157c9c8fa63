// aptx
// Copyright (c) 2026 The aptx Authors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-channel codec state: one QMF analysis/synthesis tree, one dither generator, and one
//! quantizer/predictor pair per sub-band.
//!
//! Encoding a frame is split into two phases because parity insertion is a cross-channel
//! decision made by [`crate::Context`]: [`Channel::quantize_frame`] produces this channel's
//! raw quantized samples without touching any state a later frame depends on, and
//! [`Channel::commit_encoded_frame`] folds in whatever the caller (after possibly perturbing
//! one sample for parity) decided the final samples were. Decoding is split the same way,
//! because unpacking a codeword needs this frame's dither parity bit *before* the quantized
//! samples themselves are known (see `pack::unpack_codeword`). `Channel` is `Clone` so
//! `Context::decode_sync` can speculatively try a candidate frame boundary and discard the
//! attempt without corrupting its real state if decoding fails.

use crate::dither::{Dither, DitherGenerator};
use crate::predict::Prediction;
use crate::qmf::Qmf;
use crate::quantize::{quantize_difference, InvertQuantize, Quantize};
use crate::tables::{tables_for, SUBBANDS, SUBBAND_COUNT};
use crate::Variant;

#[derive(Clone)]
pub(crate) struct Channel {
    qmf: Qmf,
    dither_gen: DitherGenerator,
    invert_quantize: [InvertQuantize; SUBBAND_COUNT],
    prediction: [Prediction; SUBBAND_COUNT],
    prev_quantized: [i32; SUBBAND_COUNT],
    pending_dither: Dither,
}

impl Channel {
    pub(crate) fn new(variant: Variant) -> Self {
        let prediction = SUBBANDS.map(|sb| Prediction::new(tables_for(variant, sb).prediction_order));
        Channel {
            qmf: Qmf::new(),
            dither_gen: DitherGenerator::new(),
            invert_quantize: [InvertQuantize::new(); SUBBAND_COUNT],
            prediction,
            prev_quantized: [0; SUBBAND_COUNT],
            pending_dither: Dither::default(),
        }
    }

    /// Derives this frame's dither from the previous frame's quantized samples, without
    /// mutating anything else. Both `quantize_frame` and the decode path call this; decoding
    /// needs the dither parity before it can even unpack the codeword into quantized samples.
    pub(crate) fn generate_dither(&mut self) -> Dither {
        self.pending_dither = self.dither_gen.generate(self.prev_quantized);
        self.pending_dither
    }

    /// The dither parity bit derived by the most recent [`Channel::generate_dither`] call.
    pub(crate) fn dither_parity(&self) -> bool {
        self.pending_dither.parity
    }

    /// Phase 1 of encoding: QMF-analyzes `pcm` and quantizes each sub-band's prediction error
    /// against the current predictor state. Nothing here is committed; call
    /// [`Channel::commit_encoded_frame`] with the final (possibly parity-perturbed) quantized
    /// samples to advance this channel.
    pub(crate) fn quantize_frame(&mut self, variant: Variant, pcm: [i32; 4]) -> [Quantize; SUBBAND_COUNT] {
        let subband_samples = self.qmf.analyze(pcm);
        self.generate_dither();

        let mut results = [Quantize::default(); SUBBAND_COUNT];
        for (i, &sb) in SUBBANDS.iter().enumerate() {
            let tables = tables_for(variant, sb);
            let sample_diff = subband_samples[i] - self.prediction[i].predicted_sample;
            results[i] = quantize_difference(
                sample_diff,
                self.pending_dither.values[i],
                self.invert_quantize[i].quantization_factor,
                tables,
            );
        }
        results
    }

    /// Phase 2 of encoding: commits the final quantized samples, advancing the inverse
    /// quantizer and predictor so this channel's state matches exactly what the decoder will
    /// reconstruct.
    pub(crate) fn commit_encoded_frame(&mut self, variant: Variant, quantized: [i32; SUBBAND_COUNT]) {
        for (i, &sb) in SUBBANDS.iter().enumerate() {
            let tables = tables_for(variant, sb);
            self.invert_quantize[i].invert(quantized[i], self.pending_dither.values[i], tables);
            self.prediction[i].process_subband(self.invert_quantize[i].reconstructed_difference);
        }
        self.prev_quantized = quantized;
    }

    /// Decodes one frame's already-unpacked quantized sub-band samples into 4 PCM samples.
    /// Call [`Channel::generate_dither`] first; its result is what `pack::unpack_codeword`
    /// needed in order to recover HF's true low bit in the first place.
    pub(crate) fn decode_commit(&mut self, variant: Variant, quantized: [i32; SUBBAND_COUNT]) -> [i32; 4] {
        let mut subband_samples = [0i32; SUBBAND_COUNT];
        for (i, &sb) in SUBBANDS.iter().enumerate() {
            let tables = tables_for(variant, sb);
            self.invert_quantize[i].invert(quantized[i], self.pending_dither.values[i], tables);
            subband_samples[i] = self.prediction[i].process_subband(self.invert_quantize[i].reconstructed_difference);
        }
        self.prev_quantized = quantized;
        self.qmf.synthesize(subband_samples)
    }
}
