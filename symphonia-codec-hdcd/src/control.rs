// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bitflags::bitflags;

bitflags! {
    /// Per-channel decoder options, equivalent to `decoder_options` in the reference.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DecoderFlags: u8 {
        /// Treat peak-extend as always active for the purpose of the analyze-mode PE signal,
        /// so the carrier reports where PE *would* fire even when no packet enabled it.
        /// `HDCD_FLAG_FORCE_PE` in `hdcd_decode2.h`.
        const FORCE_PE = 0x80;
        /// Suppress the single "target_gain mismatch" log line the stereo coordinator would
        /// otherwise emit once per run. `HDCD_FLAG_TGM_LOG_OFF` in the reference; its value is
        /// not in the material available to this crate (defined outside the retrieved headers),
        /// so `0x01` is a documented placeholder, consistent with this crate's other wire-format
        /// placeholders (see DESIGN.md).
        const TGM_LOG_OFF = 0x01;
    }
}

/// A decoded HDCD control code: target gain plus the two feature flags it carries.
///
/// `control` bits 0-3 hold `target_gain`, bit 4 `peak_extend`, bit 5 `transient_filter`, bits
/// 6-7 are reserved-zero. This type is the structured form Design Notes §9 calls for; the raw
/// byte form is only handled at the wire-format boundary in [`crate::scanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlCode {
    /// 4-bit magnitude in 0.5 dB steps, representing an attenuation in 0.0..=-7.5 dB.
    pub target_gain: u8,
    pub peak_extend: bool,
    pub transient_filter: bool,
}

impl ControlCode {
    pub const NEUTRAL: ControlCode =
        ControlCode { target_gain: 0, peak_extend: false, transient_filter: false };

    /// Decode `control` bits 0-3/4/5. Returns `None` if the reserved bits 6-7 are nonzero, in
    /// which case the packet must be rejected (spec.md §3 invariant on `target_gain`).
    pub fn from_byte(control: u8) -> Option<ControlCode> {
        if control & 0xc0 != 0 {
            return None;
        }
        Some(ControlCode {
            target_gain: control & 0x0f,
            peak_extend: control & 0x10 != 0,
            transient_filter: control & 0x20 != 0,
        })
    }

    pub fn to_byte(self) -> u8 {
        let mut b = self.target_gain & 0x0f;
        if self.peak_extend {
            b |= 0x10;
        }
        if self.transient_filter {
            b |= 0x20;
        }
        b
    }

    /// The target gain expressed in dB, always in `0.0..=-7.5`.
    pub fn target_gain_db(self) -> f32 {
        -0.5 * f32::from(self.target_gain)
    }
}

/// The result of one scan step over the packet window, a sum type per Design Notes §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// No prefix recognized this sample.
    None,
    /// A valid format A packet decoded to this control code.
    FormatA(ControlCode),
    /// A format A prefix matched except for an expected-zero bit being one.
    AAlmost,
    /// A valid format B packet decoded to this control code.
    FormatB(ControlCode),
    /// A format B prefix matched but the two halves failed the XOR check.
    BCheckFail,
    /// A prefix was recognized (`code_counterC`) but the following bits formed no valid code.
    Unmatched,
}
