// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The packet scanner: a running window over a channel's sample LSBs, recognizing the two
//! HDCD packet formats.
//!
//! Format A's prefix is derived directly from spec.md §4.1's literal `7e0fa005` constant (see
//! below). Format B's prefix, by contrast, is not given a literal value anywhere in the material
//! bundled with this crate, so it remains a fixed, internally-consistent placeholder (see
//! DESIGN.md, "Open Question: wire-format constants"): a conformant binary-compatible decoder
//! would substitute the published value into `FORMAT_B_PREFIX` without touching the surrounding
//! state machine.

use crate::control::{ControlCode, PacketKind};

/// Format A: a 28-bit prefix, an 8-bit control byte, then 2 required-zero bits. 38 bits total.
const FORMAT_A_PREFIX_BITS: u32 = 28;
const FORMAT_A_CONTROL_BITS: u32 = 8;
const FORMAT_A_TRAILING_ZERO_BITS: u32 = 2;
const FORMAT_A_TOTAL_BITS: u32 =
    FORMAT_A_PREFIX_BITS + FORMAT_A_CONTROL_BITS + FORMAT_A_TRAILING_ZERO_BITS;

/// spec.md §4.1: "`7e0fa005` pattern within the top 28 bits". The prefix is exactly those top 28
/// bits of the literal 32-bit value, i.e. `0x7e0fa005` with its low nibble dropped.
const FORMAT_A_PREFIX_LITERAL: u32 = 0x7e0f_a005;
const FORMAT_A_PREFIX: u64 = (FORMAT_A_PREFIX_LITERAL >> 4) as u64;

/// Of the two required-zero bits following the control byte, the first (the more significant of
/// the two, immediately after the control byte) is the one spec.md §4.1 calls out: "a match that
/// differs only in an expected-zero bit being one is logged as A-almost". Its sibling, the final
/// required-zero bit, carries no such exception — if it, or anything else, is also off, the
/// packet is `Unmatched` rather than `AAlmost`.
const FORMAT_A_EXPECTED_ZERO_MASK: u32 = 0b10;

/// Format B: a 6-bit prefix, an 8-bit control byte, and an 8-bit XOR check. 22 bits total.
const FORMAT_B_PREFIX_BITS: u32 = 6;
const FORMAT_B_CONTROL_BITS: u32 = 8;
const FORMAT_B_CHECK_BITS: u32 = 8;
const FORMAT_B_TOTAL_BITS: u32 =
    FORMAT_B_PREFIX_BITS + FORMAT_B_CONTROL_BITS + FORMAT_B_CHECK_BITS;

const FORMAT_B_PREFIX: u32 = 0b10_1101;

/// Maintains the running LSB window and recognizes packet prefixes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketScanner {
    window: u64,
    readahead: u8,
}

impl PacketScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.window = 0;
        self.readahead = 0;
    }

    pub fn window(&self) -> u64 {
        self.window
    }

    pub fn readahead(&self) -> u8 {
        self.readahead
    }

    /// Shift in the LSB of the next sample and, if not inside a just-recognized packet's
    /// readahead span, test for a prefix match. Returns the event recognized this sample.
    pub fn scan(&mut self, lsb: u32) -> PacketKind {
        self.window = (self.window << 1) | u64::from(lsb & 1);

        if self.readahead > 0 {
            self.readahead -= 1;
            return PacketKind::None;
        }

        if let Some((kind, consumed_bits)) = Self::match_format_a(self.window) {
            if matches!(kind, PacketKind::FormatA(_) | PacketKind::Unmatched) {
                self.readahead = (consumed_bits - 1) as u8;
            }
            return kind;
        }

        if let Some((kind, consumed_bits)) =
            Self::match_format_b(self.window)
        {
            if matches!(
                kind,
                PacketKind::FormatB(_) | PacketKind::Unmatched | PacketKind::BCheckFail
            ) {
                self.readahead = (consumed_bits - 1) as u8;
            }
            return kind;
        }

        PacketKind::None
    }

    fn match_format_a(window: u64) -> Option<(PacketKind, u32)> {
        let total = FORMAT_A_TOTAL_BITS;
        let frame = window & ((1u64 << total) - 1);

        let trailing = (frame & ((1 << FORMAT_A_TRAILING_ZERO_BITS) - 1)) as u32;
        let control =
            ((frame >> FORMAT_A_TRAILING_ZERO_BITS) & ((1 << FORMAT_A_CONTROL_BITS) - 1)) as u32;
        let prefix = frame >> (FORMAT_A_TRAILING_ZERO_BITS + FORMAT_A_CONTROL_BITS);

        if prefix != FORMAT_A_PREFIX {
            return None;
        }

        if trailing == 0 {
            return match ControlCode::from_byte(control as u8) {
                Some(code) => Some((PacketKind::FormatA(code), total)),
                None => Some((PacketKind::Unmatched, total)),
            };
        }

        if trailing == FORMAT_A_EXPECTED_ZERO_MASK {
            return Some((PacketKind::AAlmost, total));
        }

        Some((PacketKind::Unmatched, total))
    }

    fn match_format_b(window: u64) -> Option<(PacketKind, u32)> {
        let total = FORMAT_B_TOTAL_BITS;
        let frame = (window & ((1u64 << total) - 1)) as u32;

        let check = frame & ((1 << FORMAT_B_CHECK_BITS) - 1);
        let control = (frame >> FORMAT_B_CHECK_BITS) & ((1 << FORMAT_B_CONTROL_BITS) - 1);
        let prefix = frame >> (FORMAT_B_CHECK_BITS + FORMAT_B_CONTROL_BITS);

        if prefix != FORMAT_B_PREFIX {
            return None;
        }

        if control ^ check != 0xFF {
            return Some((PacketKind::BCheckFail, total));
        }

        match ControlCode::from_byte(control as u8) {
            Some(code) => Some((PacketKind::FormatB(code), total)),
            None => Some((PacketKind::Unmatched, total)),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Encode a format A packet's bit pattern, MSB (prefix) first, as would appear shifted into
    /// a channel's sample LSBs.
    pub(crate) fn encode_format_a(code: ControlCode) -> Vec<u32> {
        let frame = (FORMAT_A_PREFIX << (FORMAT_A_CONTROL_BITS + FORMAT_A_TRAILING_ZERO_BITS))
            | (u64::from(code.to_byte()) << FORMAT_A_TRAILING_ZERO_BITS);
        bits_msb_first(frame, FORMAT_A_TOTAL_BITS)
    }

    /// Encode a format A packet with only the designated expected-zero bit set in the
    /// otherwise-all-zero trailing field ("A-almost").
    pub(crate) fn encode_format_a_almost(code: ControlCode) -> Vec<u32> {
        let frame = (FORMAT_A_PREFIX << (FORMAT_A_CONTROL_BITS + FORMAT_A_TRAILING_ZERO_BITS))
            | (u64::from(code.to_byte()) << FORMAT_A_TRAILING_ZERO_BITS)
            | u64::from(FORMAT_A_EXPECTED_ZERO_MASK);
        bits_msb_first(frame, FORMAT_A_TOTAL_BITS)
    }

    pub(crate) fn encode_format_b(code: ControlCode) -> Vec<u32> {
        let check = code.to_byte() ^ 0xFF;
        let frame = (FORMAT_B_PREFIX << (FORMAT_B_CONTROL_BITS + FORMAT_B_CHECK_BITS))
            | (u32::from(code.to_byte()) << FORMAT_B_CHECK_BITS)
            | u32::from(check);
        bits_msb_first_u32(frame, FORMAT_B_TOTAL_BITS)
    }

    /// Encode a format B packet with a deliberately corrupted XOR check.
    pub(crate) fn encode_format_b_bad_xor(code: ControlCode) -> Vec<u32> {
        let bad_check = code.to_byte(); // should be !code.to_byte(), so this fails the XOR law.
        let frame = (FORMAT_B_PREFIX << (FORMAT_B_CONTROL_BITS + FORMAT_B_CHECK_BITS))
            | (u32::from(code.to_byte()) << FORMAT_B_CHECK_BITS)
            | u32::from(bad_check);
        bits_msb_first_u32(frame, FORMAT_B_TOTAL_BITS)
    }

    /// Encode a format A packet whose control byte has a reserved bit (6 or 7) set, so the
    /// prefix matches but `ControlCode::from_byte` rejects the code ("Unmatched").
    pub(crate) fn encode_format_a_reserved_bit_set() -> Vec<u32> {
        let frame = (FORMAT_A_PREFIX << (FORMAT_A_CONTROL_BITS + FORMAT_A_TRAILING_ZERO_BITS))
            | (0x40u64 << FORMAT_A_TRAILING_ZERO_BITS);
        bits_msb_first(frame, FORMAT_A_TOTAL_BITS)
    }

    fn bits_msb_first(frame: u64, width: u32) -> Vec<u32> {
        (0..width).rev().map(|i| ((frame >> i) & 1) as u32).collect()
    }

    fn bits_msb_first_u32(frame: u32, width: u32) -> Vec<u32> {
        bits_msb_first(u64::from(frame), width)
    }
}
