// aptx
// Copyright (c) 2026 The aptx Authors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bit-exact aptX / aptX HD encoder and decoder.
//!
//! [`Context`] is the entire public surface: construct one with [`Context::new`], feed it PCM
//! or codeword bytes, and it mutates in place exactly the way the reference codec does. There
//! is no `Error` type here — the only failure modes the core recognizes are "output buffer is
//! full" (ordinary flow control, signalled by a short `written` count) and "decoded frame
//! failed its parity check" (signalled by a short `consumed` count, or by [`Context::decode_sync`]'s
//! `synced`/`dropped` pair). Everything else is total: clipping and sign extension are part of
//! the arithmetic, not error conditions.

mod channel;
mod dither;
mod fixed;
mod pack;
mod parity;
mod predict;
mod qmf;
mod quantize;
mod tables;

use channel::Channel;
use pack::{codeword_byte_width, codeword_from_bytes, codeword_to_bytes, pack_codeword, unpack_codeword};
use parity::{advance_sync_idx, check_parity, insert_sync, quantized_parity, ChannelParityInput};
use quantize::Quantize;
use tables::SUBBAND_COUNT;

/// Crate version, exposed the same way the reference library exposes its `major`/`minor`/`patch`
/// integers: read-only constants, not mutable process state.
pub mod version {
    /// Major version: incremented on wire- or bit-exactness-breaking changes.
    pub const MAJOR: u32 = 0;
    /// Minor version: incremented when new operations are added.
    pub const MINOR: u32 = 1;
    /// Patch version.
    pub const PATCH: u32 = 0;
}

/// Which of the two codec variants a [`Context`] implements.
///
/// The reference library represents this as a single `hd` boolean; this is the same bit,
/// spelled out as an enum so callers can't pass an out-of-range integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// 6:1 compression, 16-bit codewords.
    AptX,
    /// 4:1 compression, 24-bit codewords.
    AptxHd,
}

impl Variant {
    fn is_hd(self) -> bool {
        matches!(self, Variant::AptxHd)
    }
}

/// The byte sequence that begins any aptX stream encoded from silence by a freshly reset
/// context. Exposed so a thin CLI can sniff which variant an unlabeled stream is (spec.md §6
/// "Wire formats"); the core makes no framing decision based on it.
pub const APTX_SILENCE_PREFIX: [u8; 4] = [0x4b, 0xbf, 0x4b, 0xbf];

/// The aptX HD equivalent of [`APTX_SILENCE_PREFIX`].
pub const APTX_HD_SILENCE_PREFIX: [u8; 6] = [0x73, 0xbe, 0xff, 0x73, 0xbe, 0xff];

const SAMPLES_PER_FRAME: usize = 4;
const PCM_BYTES_PER_SAMPLE: usize = 3;
const CHANNEL_COUNT: usize = 2;

/// One frame's PCM footprint: 4 samples, 2 channels, 3 bytes each.
const PCM_FRAME_BYTES: usize = SAMPLES_PER_FRAME * PCM_BYTES_PER_SAMPLE * CHANNEL_COUNT;

/// The QMF tree's analysis/synthesis delay, in samples per channel.
const LATENCY_SAMPLES: u32 = 90;

/// Flush/confirmation length in frames: `ceil(LATENCY_SAMPLES / SAMPLES_PER_FRAME)`.
const FLUSH_FRAMES: u32 = 23;

fn read_pcm24(bytes: &[u8]) -> i32 {
    let raw = (bytes[0] as i32) | ((bytes[1] as i32) << 8) | ((bytes[2] as i32) << 16);
    fixed::sign_extend(raw, 24)
}

fn write_pcm24(value: i32, out: &mut [u8]) {
    let v = value as u32;
    out[0] = v as u8;
    out[1] = (v >> 8) as u8;
    out[2] = (v >> 16) as u8;
}

fn parity_input(dither_parity: bool, results: [Quantize; SUBBAND_COUNT]) -> ChannelParityInput {
    let mut quantized = [0i32; SUBBAND_COUNT];
    let mut parity_change = [0i32; SUBBAND_COUNT];
    let mut error = [0i64; SUBBAND_COUNT];
    for i in 0..SUBBAND_COUNT {
        quantized[i] = results[i].quantized_sample;
        parity_change[i] = results[i].quantized_sample_parity_change;
        error[i] = results[i].error;
    }
    ChannelParityInput { dither_parity, quantized, parity_change, error }
}

/// All per-stream codec state: two [`Channel`]s, the cross-channel sync counter, and the
/// bookkeeping needed by the streaming encode/decode drivers.
///
/// There is exactly one `Context` type for every external operation in the library — encode,
/// decode, and the self-synchronizing decode all mutate the same struct. Nothing here is
/// thread-safe; a `Context` must not be shared across threads without external synchronization,
/// though independent `Context`s need no coordination at all (tables are immutable and shared).
pub struct Context {
    hd: bool,
    left: Channel,
    right: Channel,
    sync_idx: u32,

    /// Zero-PCM frames still owed to [`Context::encode_finish`]. Reaches 0 once the QMF
    /// latency has been flushed; stays at 0 (rather than re-arming) until an explicit
    /// [`Context::reset`], so repeated calls to `encode_finish` after completion are no-ops.
    encode_remaining: u32,

    /// Samples of decoder output still being discarded to absorb the QMF's analysis/synthesis
    /// latency. Counts down per *sample*, not per frame, so the partial final frame (indices 2
    /// and 3 of frame 22) is handled without a special case. A byte drop during auto-sync decode
    /// resets this to [`LATENCY_SAMPLES`] too, since the QMF state was just corrupted and needs
    /// the same flush before its output is trustworthy again.
    decode_skip_leading: u32,

    /// Auto-sync confirmation counter: frames still owed before [`Context::decode_sync`] will
    /// report `synced = true`. Starts (and is reset on every parity failure) at
    /// [`FLUSH_FRAMES`], and ticks down by one per *frame* successfully decoded, independent of
    /// `decode_skip_leading`'s per-sample bookkeeping. This is the `UNSYNCED`/`CONFIRMING(k)`
    /// state machine collapsed into a single counter: `k` consecutive good decodes is
    /// `confirm_frames == FLUSH_FRAMES - k`, and it reaches `SYNCED` (counter at 0) after
    /// exactly `FLUSH_FRAMES` of them.
    confirm_frames: u32,

    decode_sync_buffer: [u8; 5],
    decode_sync_buffer_len: usize,
    decode_dropped: u32,
}

impl Context {
    /// Creates a freshly reset context for `variant`.
    pub fn new(variant: Variant) -> Self {
        log::trace!("creating aptx context for {variant:?}");
        Context {
            hd: variant.is_hd(),
            left: Channel::new(variant),
            right: Channel::new(variant),
            sync_idx: 0,
            encode_remaining: FLUSH_FRAMES,
            decode_skip_leading: LATENCY_SAMPLES,
            confirm_frames: FLUSH_FRAMES,
            decode_sync_buffer: [0; 5],
            decode_sync_buffer_len: 0,
            decode_dropped: 0,
        }
    }

    fn variant(&self) -> Variant {
        if self.hd { Variant::AptxHd } else { Variant::AptX }
    }

    /// Resets every field except the variant, re-establishing a freshly-constructed context's
    /// invariants. Clears the auto-sync byte cache too.
    pub fn reset(&mut self) {
        let variant = self.variant();
        self.left = Channel::new(variant);
        self.right = Channel::new(variant);
        self.sync_idx = 0;
        self.encode_remaining = FLUSH_FRAMES;
        self.decode_skip_leading = LATENCY_SAMPLES;
        self.confirm_frames = FLUSH_FRAMES;
        self.decode_sync_buffer_len = 0;
        self.decode_dropped = 0;
    }

    fn clear_codec_state(&mut self) {
        let variant = self.variant();
        self.left = Channel::new(variant);
        self.right = Channel::new(variant);
        self.sync_idx = 0;
    }

    /// Encodes one frame, advancing both channels and returning the packed codeword bytes
    /// (`LLRR` for aptX, `LLLRRR` for aptX HD).
    fn encode_frame(&mut self, left_pcm: [i32; 4], right_pcm: [i32; 4]) -> Vec<u8> {
        let variant = self.variant();
        let left_results = self.left.quantize_frame(variant, left_pcm);
        let right_results = self.right.quantize_frame(variant, right_pcm);

        let mut left_input = parity_input(self.left.dither_parity(), left_results);
        let mut right_input = parity_input(self.right.dither_parity(), right_results);
        insert_sync(self.sync_idx, &mut right_input, &mut left_input);
        self.sync_idx = advance_sync_idx(self.sync_idx);

        let left_bit = quantized_parity(left_input.dither_parity, left_input.quantized);
        let right_bit = quantized_parity(right_input.dither_parity, right_input.quantized);

        self.left.commit_encoded_frame(variant, left_input.quantized);
        self.right.commit_encoded_frame(variant, right_input.quantized);

        let left_word = pack_codeword(variant, left_input.quantized, left_bit);
        let right_word = pack_codeword(variant, right_input.quantized, right_bit);

        let mut bytes = codeword_to_bytes(variant, left_word);
        bytes.extend(codeword_to_bytes(variant, right_word));
        bytes
    }

    /// Decodes one frame, committing both channels' state unconditionally (mirroring the
    /// reference order: reconstruct first, then check parity) and reporting the parity
    /// verdict. A caller that sees `None` must stop; the committed state is not meant to be
    /// rolled back, since plain `decode` treats a parity failure as fatal for the stream.
    fn decode_frame(&mut self, left_word: u32, right_word: u32) -> Option<[[i32; 4]; 2]> {
        let variant = self.variant();
        let left_dither = self.left.generate_dither();
        let right_dither = self.right.generate_dither();
        let left_quantized = unpack_codeword(variant, left_word, left_dither.parity);
        let right_quantized = unpack_codeword(variant, right_word, right_dither.parity);

        let left_pcm = self.left.decode_commit(variant, left_quantized);
        let right_pcm = self.right.decode_commit(variant, right_quantized);

        let mismatch = check_parity(
            self.sync_idx,
            left_dither.parity,
            left_quantized,
            right_dither.parity,
            right_quantized,
        );
        self.sync_idx = advance_sync_idx(self.sync_idx);

        if mismatch { None } else { Some([left_pcm, right_pcm]) }
    }

    /// Speculatively decodes one candidate frame for the auto-sync path: parity is checked
    /// *before* anything commits, and on failure both channels are rolled back to exactly
    /// where they were, so the caller can shift its byte window by one and retry without the
    /// attempt having corrupted predictor or dither state.
    fn try_decode_frame_sync(&mut self, left_word: u32, right_word: u32) -> Option<[[i32; 4]; 2]> {
        let variant = self.variant();
        let backup_left = self.left.clone();
        let backup_right = self.right.clone();

        let left_dither = self.left.generate_dither();
        let right_dither = self.right.generate_dither();
        let left_quantized = unpack_codeword(variant, left_word, left_dither.parity);
        let right_quantized = unpack_codeword(variant, right_word, right_dither.parity);

        let mismatch = check_parity(
            self.sync_idx,
            left_dither.parity,
            left_quantized,
            right_dither.parity,
            right_quantized,
        );
        if mismatch {
            self.left = backup_left;
            self.right = backup_right;
            return None;
        }
        self.sync_idx = advance_sync_idx(self.sync_idx);

        let left_pcm = self.left.decode_commit(variant, left_quantized);
        let right_pcm = self.right.decode_commit(variant, right_quantized);
        Some([left_pcm, right_pcm])
    }

    /// Writes `pcm`'s samples to `out`, skipping whatever is still owed to
    /// [`Context::decode_skip_leading`]. `out` must have room for a full frame (24 bytes); the
    /// return value is how much of it was actually used.
    fn emit_pcm_skipping_latency(&mut self, pcm: [[i32; 4]; 2], out: &mut [u8]) -> usize {
        let mut written = 0;
        for sample_idx in 0..SAMPLES_PER_FRAME {
            if self.decode_skip_leading > 0 {
                self.decode_skip_leading -= 1;
                continue;
            }
            write_pcm24(pcm[0][sample_idx], &mut out[written..written + 3]);
            written += 3;
            write_pcm24(pcm[1][sample_idx], &mut out[written..written + 3]);
            written += 3;
        }
        written
    }

    /// Encodes as many whole PCM frames from `input` as fit, writing codewords to `output`.
    /// Returns `(consumed, written)`; stops when either buffer runs out of room, never when a
    /// partial frame remains in `input`.
    pub fn encode(&mut self, input: &[u8], output: &mut [u8]) -> (usize, usize) {
        let pair_bytes = codeword_byte_width(self.variant()) * 2;
        let mut consumed = 0;
        let mut written = 0;
        while input.len() - consumed >= PCM_FRAME_BYTES && output.len() - written >= pair_bytes {
            let mut left_pcm = [0i32; 4];
            let mut right_pcm = [0i32; 4];
            let mut off = consumed;
            for i in 0..SAMPLES_PER_FRAME {
                left_pcm[i] = read_pcm24(&input[off..off + 3]);
                off += 3;
                right_pcm[i] = read_pcm24(&input[off..off + 3]);
                off += 3;
            }
            let bytes = self.encode_frame(left_pcm, right_pcm);
            output[written..written + bytes.len()].copy_from_slice(&bytes);
            written += bytes.len();
            consumed += PCM_FRAME_BYTES;
        }
        (consumed, written)
    }

    /// Flushes the QMF's latency by feeding zero-valued frames until [`FLUSH_FRAMES`] have been
    /// emitted, possibly across several calls if `output` fills up first. Returns
    /// `(written, done)`; once `done` is `true` the codec state has been cleared and further
    /// calls are no-ops until [`Context::reset`] is called to start a new stream.
    pub fn encode_finish(&mut self, output: &mut [u8]) -> (usize, bool) {
        let pair_bytes = codeword_byte_width(self.variant()) * 2;
        let mut written = 0;
        while self.encode_remaining > 0 && output.len() - written >= pair_bytes {
            let bytes = self.encode_frame([0; 4], [0; 4]);
            output[written..written + bytes.len()].copy_from_slice(&bytes);
            written += bytes.len();
            self.encode_remaining -= 1;
        }
        if self.encode_remaining == 0 {
            log::debug!("encode flush complete, clearing codec state");
            self.clear_codec_state();
            (written, true)
        }
        else {
            (written, false)
        }
    }

    /// Decodes as many whole codewords from `input` as fit, writing PCM to `output`. Stops
    /// immediately on the first parity failure; `consumed < input.len()` in that case is the
    /// caller's signal that the stream is corrupt from this point on.
    pub fn decode(&mut self, input: &[u8], output: &mut [u8]) -> (usize, usize) {
        let variant = self.variant();
        let word_bytes = codeword_byte_width(variant);
        let pair_bytes = word_bytes * 2;
        let mut consumed = 0;
        let mut written = 0;
        while input.len() - consumed >= pair_bytes {
            if output.len() - written < PCM_FRAME_BYTES {
                break;
            }
            let left_word = codeword_from_bytes(variant, &input[consumed..consumed + word_bytes]);
            let right_word = codeword_from_bytes(variant, &input[consumed + word_bytes..consumed + pair_bytes]);
            match self.decode_frame(left_word, right_word) {
                Some(pcm) => {
                    consumed += pair_bytes;
                    written += self.emit_pcm_skipping_latency(pcm, &mut output[written..]);
                }
                None => break,
            }
        }
        (consumed, written)
    }

    /// Self-synchronizing decode: tolerant of single-byte drops or insertions anywhere in
    /// `input`. Returns `(consumed, written, synced, dropped)`. `synced` is `true` once the
    /// codec has decoded [`FLUSH_FRAMES`] consecutive good frames since the last (or first)
    /// loss of alignment (the `UNSYNCED` -> `CONFIRMING(k)` -> confirmed transition tracked by
    /// `confirm_frames`); `dropped` reports how many bytes were discarded to get there, exactly
    /// once, at the call where the confirmation window closes.
    ///
    /// One byte at a time, `input` (prefixed with whatever didn't form a whole codeword pair
    /// last call) is tried as a codeword boundary: a parity failure rolls the speculative
    /// decode back and the window slides forward by a single byte, so a dropped or injected
    /// byte anywhere in the stream is found and stepped over without the caller having to
    /// locate it.
    ///
    /// `output` should have room for at least `input.len()` scaled by the PCM:codeword ratio,
    /// plus one spare frame (24 bytes).
    pub fn decode_sync(&mut self, input: &[u8], output: &mut [u8]) -> (usize, usize, bool, u32) {
        let variant = self.variant();
        let word_bytes = codeword_byte_width(variant);
        let pair_bytes = word_bytes * 2;

        let cache_len = self.decode_sync_buffer_len;
        let mut buffer = Vec::with_capacity(cache_len + input.len());
        buffer.extend_from_slice(&self.decode_sync_buffer[..cache_len]);
        buffer.extend_from_slice(input);

        let mut pos = 0usize;
        let mut written = 0usize;
        while buffer.len() - pos >= pair_bytes {
            if output.len() - written < PCM_FRAME_BYTES {
                break;
            }
            let left_word = codeword_from_bytes(variant, &buffer[pos..pos + word_bytes]);
            let right_word = codeword_from_bytes(variant, &buffer[pos + word_bytes..pos + pair_bytes]);
            match self.try_decode_frame_sync(left_word, right_word) {
                Some(pcm) => {
                    pos += pair_bytes;
                    written += self.emit_pcm_skipping_latency(pcm, &mut output[written..]);
                    self.confirm_frames = self.confirm_frames.saturating_sub(1);
                }
                None => {
                    log::debug!("parity mismatch during auto-sync decode, dropping one byte");
                    pos += 1;
                    self.decode_dropped += 1;
                    self.decode_skip_leading = LATENCY_SAMPLES;
                    self.confirm_frames = FLUSH_FRAMES;
                    self.sync_idx = 0;
                }
            }
        }

        let leftover_len = buffer.len() - pos;
        self.decode_sync_buffer[..leftover_len].copy_from_slice(&buffer[pos..]);
        self.decode_sync_buffer_len = leftover_len;

        let consumed = pos.saturating_sub(cache_len);
        let now_synced = self.confirm_frames == 0;
        let dropped = if now_synced && self.decode_dropped > 0 { std::mem::take(&mut self.decode_dropped) } else { 0 };

        (consumed, written, now_synced, dropped)
    }

    /// Reports however many bytes are sitting in the auto-sync cache (they will never form a
    /// complete codeword now that the stream has ended) and resets the context.
    pub fn decode_sync_finish(&mut self) -> usize {
        let dropped = self.decode_sync_buffer_len;
        self.reset();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_silence_from_a_fresh_context_starts_with_the_published_prefix() {
        for (variant, prefix) in [
            (Variant::AptX, &APTX_SILENCE_PREFIX[..]),
            (Variant::AptxHd, &APTX_HD_SILENCE_PREFIX[..]),
        ] {
            let mut ctx = Context::new(variant);
            let input = vec![0u8; PCM_FRAME_BYTES * 4];
            let mut output = vec![0u8; 256];
            let (_, written) = ctx.encode(&input, &mut output);
            assert!(written >= prefix.len());
            assert_eq!(&output[..prefix.len()], prefix);
        }
    }

    #[test]
    fn encode_then_decode_round_trips_silence_after_the_latency_skip() {
        let mut enc = Context::new(Variant::AptX);
        let mut dec = Context::new(Variant::AptX);

        let frames = 64;
        let pcm_in = vec![0u8; PCM_FRAME_BYTES * frames];
        let mut coded = vec![0u8; PCM_FRAME_BYTES * frames];
        let (consumed, written) = enc.encode(&pcm_in, &mut coded);
        assert_eq!(consumed, pcm_in.len());

        let mut pcm_out = vec![0u8; PCM_FRAME_BYTES * frames];
        let (decoded_consumed, decoded_written) = dec.decode(&coded[..written], &mut pcm_out);
        assert_eq!(decoded_consumed, written);
        assert!(pcm_out[..decoded_written].iter().all(|&b| b == 0));
    }

    #[test]
    fn flush_emits_exactly_flush_frames_worth_of_codewords() {
        let mut ctx = Context::new(Variant::AptX);
        let mut output = vec![0u8; 4 * FLUSH_FRAMES as usize];
        let (written, done) = ctx.encode_finish(&mut output);
        assert!(done);
        assert_eq!(written, 4 * FLUSH_FRAMES as usize);
    }

    #[test]
    fn flush_is_idempotent_once_complete() {
        let mut ctx = Context::new(Variant::AptX);
        let mut output = vec![0u8; 4 * FLUSH_FRAMES as usize];
        let (_, done) = ctx.encode_finish(&mut output);
        assert!(done);
        let (written_again, done_again) = ctx.encode_finish(&mut output);
        assert_eq!(written_again, 0);
        assert!(done_again);
    }

    #[test]
    fn reset_makes_a_second_stream_match_a_fresh_context() {
        let mut reused = Context::new(Variant::AptX);
        let mut fresh = Context::new(Variant::AptX);

        let noisy = vec![0x11u8; PCM_FRAME_BYTES * 8];
        let mut scratch = vec![0u8; PCM_FRAME_BYTES * 8];
        reused.encode(&noisy, &mut scratch);
        reused.reset();

        let probe = vec![0u8; PCM_FRAME_BYTES * 4];
        let mut out_reused = vec![0u8; PCM_FRAME_BYTES * 4];
        let mut out_fresh = vec![0u8; PCM_FRAME_BYTES * 4];
        let (_, w1) = reused.encode(&probe, &mut out_reused);
        let (_, w2) = fresh.encode(&probe, &mut out_fresh);
        assert_eq!(w1, w2);
        assert_eq!(out_reused[..w1], out_fresh[..w2]);
    }

    #[test]
    fn decode_sync_recovers_after_a_single_byte_drop() {
        let mut enc = Context::new(Variant::AptX);
        let frames = 64;
        let pcm_in = vec![0u8; PCM_FRAME_BYTES * frames];
        let mut coded = vec![0u8; PCM_FRAME_BYTES * frames];
        let (_, written) = enc.encode(&pcm_in, &mut coded);
        coded.truncate(written);

        // Drop one byte well past the initial latency window.
        let mut corrupted = coded.clone();
        corrupted.remove(100);

        let mut dec = Context::new(Variant::AptX);
        let mut pcm_out = vec![0u8; PCM_FRAME_BYTES * frames];
        let (_, _, _, dropped_total) = {
            let mut total_dropped = 0u32;
            let mut total_written = 0usize;
            let mut consumed_total = 0usize;
            let mut synced = false;
            while consumed_total < corrupted.len() {
                let (consumed, written, this_synced, dropped) =
                    dec.decode_sync(&corrupted[consumed_total..], &mut pcm_out[total_written..]);
                if consumed == 0 && written == 0 {
                    break;
                }
                consumed_total += consumed;
                total_written += written;
                total_dropped += dropped;
                synced = this_synced;
            }
            (consumed_total, total_written, synced, total_dropped)
        };
        assert_eq!(dropped_total, 1);
    }

    #[test]
    fn decode_sync_finish_reports_cached_byte_count() {
        let mut ctx = Context::new(Variant::AptxHd);
        let mut output = vec![0u8; 64];
        // Feed fewer bytes than one codeword pair (6 bytes) so they all land in the cache.
        ctx.decode_sync(&[0xAA, 0xBB, 0xCC], &mut output);
        assert_eq!(ctx.decode_sync_finish(), 3);
    }
}
