// aptx
// Copyright (c) 2026 The aptx Authors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Codeword packing: folding one channel's four quantized sub-band samples into a single
//! bitstream codeword, and the reverse.
//!
//! Each sub-band's field width is exactly wide enough to hold every value its quantizer can
//! produce (`ceil(log2(quantize_intervals.len()))`), packed LSB-first in LF, MLF, MHF, HF
//! order: LF occupies the lowest bits of the codeword, HF the highest. Summed across sub-bands
//! this comes to 16 bits for aptX and 24 bits for aptX HD, which is also why those widths were
//! chosen as the per-channel codeword size in the first place.
//!
//! The HF field's low bit is special: the wire never carries HF's own sign bit directly, it
//! carries this channel's forward parity bit in that position instead (see
//! [`crate::parity::quantized_parity`]). Nothing is lost — the other three sub-bands' low
//! bits plus the dither parity plus the transmitted parity bit determine HF's true low bit by
//! the same XOR relation that defined the parity bit in the first place, so the unpacking
//! side recovers it by recomputing `quantized_parity` over what it just unpacked (HF's low bit
//! still holds the transmitted parity value at that point) and writing the result back in.

use crate::fixed::sign_extend;
use crate::parity::quantized_parity;
use crate::tables::{tables_for, Subband, SubbandTables, SUBBAND_COUNT, SUBBANDS};
use crate::Variant;

fn bits_for_len(len: usize) -> u32 {
    usize::BITS - (len as u32 - 1).leading_zeros()
}

fn field_width(tables: &SubbandTables) -> u32 {
    bits_for_len(tables.quantize_intervals.len())
}

/// Total codeword width in bits for one channel of `variant`: 16 for aptX, 24 for aptX HD.
pub(crate) fn codeword_bit_width(variant: Variant) -> u32 {
    SUBBANDS.iter().map(|&sb| field_width(tables_for(variant, sb))).sum()
}

/// Packs one frame's four quantized sub-band samples into a single codeword, substituting
/// `parity` for the HF sub-band's natural low bit.
///
/// Fields are laid out LSB-first in sub-band order: LF occupies the lowest bits, HF (with the
/// parity substitution) the highest, matching the wire layout in spec.md §4.8 exactly (e.g. for
/// aptX, `(q3 << 13) | (q2 << 11) | (q1 << 7) | q0`).
pub(crate) fn pack_codeword(variant: Variant, quantized: [i32; SUBBAND_COUNT], parity: bool) -> u32 {
    let mut codeword = 0u32;
    let mut offset = 0u32;
    for (i, &sb) in SUBBANDS.iter().enumerate() {
        let bits = field_width(tables_for(variant, sb));
        let mask = (1u32 << bits) - 1;
        let mut field = quantized[i] as u32 & mask;
        if i == SUBBAND_COUNT - 1 {
            field = (field & !1) | parity as u32;
        }
        codeword |= field << offset;
        offset += bits;
    }
    codeword
}

/// Unpacks a codeword into its four sign-extended quantized sub-band samples, recovering the
/// HF sub-band's true low bit from the transmitted parity bit and `dither_parity`.
pub(crate) fn unpack_codeword(variant: Variant, codeword: u32, dither_parity: bool) -> [i32; SUBBAND_COUNT] {
    let mut out = [0i32; SUBBAND_COUNT];
    let mut offset = 0u32;
    for (i, &sb) in SUBBANDS.iter().enumerate() {
        let bits = field_width(tables_for(variant, sb));
        let mask = (1u32 << bits) - 1;
        let raw = (codeword >> offset) & mask;
        out[i] = sign_extend(raw as i32, bits);
        offset += bits;
    }
    let recovered_bit = quantized_parity(dither_parity, out) as i32;
    out[SUBBAND_COUNT - 1] = (out[SUBBAND_COUNT - 1] & !1) | recovered_bit;
    out
}

/// Serializes a codeword to its big-endian wire bytes: 2 bytes for aptX, 3 for aptX HD.
pub(crate) fn codeword_to_bytes(variant: Variant, codeword: u32) -> Vec<u8> {
    match variant {
        Variant::AptX => vec![(codeword >> 8) as u8, codeword as u8],
        Variant::AptxHd => vec![(codeword >> 16) as u8, (codeword >> 8) as u8, codeword as u8],
    }
}

/// Parses a codeword from its big-endian wire bytes. `bytes` must hold at least
/// [`codeword_byte_width`] bytes.
pub(crate) fn codeword_from_bytes(variant: Variant, bytes: &[u8]) -> u32 {
    match variant {
        Variant::AptX => ((bytes[0] as u32) << 8) | bytes[1] as u32,
        Variant::AptxHd => ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32,
    }
}

/// Wire size of one channel's codeword: 2 bytes for aptX, 3 for aptX HD.
pub(crate) fn codeword_byte_width(variant: Variant) -> usize {
    match variant {
        Variant::AptX => 2,
        Variant::AptxHd => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn aptx_codeword_is_sixteen_bits_wide() {
        assert_eq!(codeword_bit_width(Variant::AptX), 16);
    }

    #[test]
    fn aptx_hd_codeword_is_twenty_four_bits_wide() {
        assert_eq!(codeword_bit_width(Variant::AptxHd), 24);
    }

    #[test]
    fn pack_then_unpack_round_trips_through_bytes_when_low_bit_already_carries_parity() {
        for &variant in &[Variant::AptX, Variant::AptxHd] {
            // Construct quantized so HF's low bit already equals quantized_parity; this is
            // always true for real encoder output, since pack_codeword enforces it.
            let mut quantized = [3, -2, 1, -4];
            let dither_parity = false;
            let parity = quantized_parity(dither_parity, quantized);
            quantized[3] = (quantized[3] & !1) | parity as i32;

            let codeword = pack_codeword(variant, quantized, parity);
            let bytes = codeword_to_bytes(variant, codeword);
            assert_eq!(bytes.len(), codeword_byte_width(variant));
            let parsed = codeword_from_bytes(variant, &bytes);
            assert_eq!(parsed, codeword);
            assert_eq!(unpack_codeword(variant, parsed, dither_parity), quantized);
        }
    }

    #[test]
    fn unpack_recovers_hf_low_bit_even_when_the_wire_bit_differs_from_hfs_own() {
        // HF's own low bit is 0 here, but the true parity bit to transmit is 1: insert_sync
        // may have perturbed HF to fix parity, or HF may simply carry whatever value results
        // from L0/L1/L2's low bits and the dither parity.
        let true_hf = 2i32; // low bit 0
        let quantized = [3, -2, 1, true_hf];
        let dither_parity = true;
        let parity = quantized_parity(dither_parity, quantized);
        assert!(parity); // sanity: this scenario actually exercises a nonzero bit.

        let codeword = pack_codeword(Variant::AptX, quantized, parity);
        let unpacked = unpack_codeword(Variant::AptX, codeword, dither_parity);
        assert_eq!(unpacked, quantized);
    }

    #[test]
    fn negative_values_sign_extend_correctly_in_the_narrowest_field() {
        // MHF has the narrowest field in both variants (2 bits for aptX, 4 for aptX HD).
        let quantized = [0, 0, -1, 0];
        let dither_parity = false;
        let parity = quantized_parity(dither_parity, quantized);
        let codeword = pack_codeword(Variant::AptX, quantized, parity);
        assert_eq!(unpack_codeword(Variant::AptX, codeword, dither_parity)[2], -1);
    }

    #[test]
    fn field_width_matches_table_length_for_every_subband() {
        assert_eq!(bits_for_len(65), 7);
        assert_eq!(bits_for_len(9), 4);
        assert_eq!(bits_for_len(3), 2);
        assert_eq!(bits_for_len(5), 3);
        assert_eq!(bits_for_len(257), 9);
        assert_eq!(bits_for_len(33), 6);
        assert_eq!(bits_for_len(9), 4);
        assert_eq!(bits_for_len(17), 5);
        let _ = Subband::Lf;
    }

    proptest! {
        /// spec.md §8 property 5: for any set of sub-band indices within their legal bit
        /// widths and any dither parity, `unpack_codeword(pack_codeword(..))` recovers the
        /// same four quantized samples once HF's low bit is restored to the true parity.
        #[test]
        fn pack_then_unpack_round_trips_for_aptx(
            q0 in -64i32..64, q1 in -8i32..8, q2 in -2i32..2, q3 in -4i32..4,
            dither_parity in proptest::bool::ANY,
        ) {
            let mut quantized = [q0, q1, q2, q3];
            let parity = quantized_parity(dither_parity, quantized);
            quantized[3] = (quantized[3] & !1) | parity as i32;

            let codeword = pack_codeword(Variant::AptX, quantized, parity);
            let bytes = codeword_to_bytes(Variant::AptX, codeword);
            let parsed = codeword_from_bytes(Variant::AptX, &bytes);
            prop_assert_eq!(unpack_codeword(Variant::AptX, parsed, dither_parity), quantized);
        }

        #[test]
        fn pack_then_unpack_round_trips_for_aptx_hd(
            q0 in -256i32..256, q1 in -32i32..32, q2 in -8i32..8, q3 in -16i32..16,
            dither_parity in proptest::bool::ANY,
        ) {
            let mut quantized = [q0, q1, q2, q3];
            let parity = quantized_parity(dither_parity, quantized);
            quantized[3] = (quantized[3] & !1) | parity as i32;

            let codeword = pack_codeword(Variant::AptxHd, quantized, parity);
            let bytes = codeword_to_bytes(Variant::AptxHd, codeword);
            let parsed = codeword_from_bytes(Variant::AptxHd, &bytes);
            prop_assert_eq!(unpack_codeword(Variant::AptxHd, parsed, dither_parity), quantized);
        }
    }
}
