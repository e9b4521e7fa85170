// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stereo coordination: two independent [`ChannelState`]s plus the cross-channel bookkeeping
//! that only makes sense with both in view — target-gain mismatch detection and the TGM analyze
//! mode, which needs both channels' current control codes to render.

use log::warn;

use crate::analyze::{self, AnalyzeMode, AnalyzeSignal};
use crate::channel::ChannelState;
use crate::control::DecoderFlags;
use crate::detect::{self, DetectionReport};
use crate::error::Result;

/// Two channels decoded together, with shared analyze-mode configuration and target-gain
/// mismatch tracking.
pub struct StereoState {
    left: ChannelState,
    right: ChannelState,
    analyze_mode: AnalyzeMode,
    ana_snb: u8,
    flags: DecoderFlags,
    count_tg_mismatch: u32,
    /// The most recent `target_gain` both channels agreed on (spec.md §4.6). `None` until the
    /// first frame where both channels' code detect timers are armed and their `target_gain`s
    /// match.
    val_target_gain: Option<u8>,
}

impl StereoState {
    pub fn new(sample_rate: u32) -> Result<Self> {
        Ok(StereoState {
            left: ChannelState::new(sample_rate)?,
            right: ChannelState::new(sample_rate)?,
            analyze_mode: AnalyzeMode::Off,
            ana_snb: 0,
            flags: DecoderFlags::empty(),
            count_tg_mismatch: 0,
            val_target_gain: None,
        })
    }

    pub fn left(&self) -> &ChannelState {
        &self.left
    }

    pub fn right(&self) -> &ChannelState {
        &self.right
    }

    pub fn left_mut(&mut self) -> &mut ChannelState {
        &mut self.left
    }

    pub fn right_mut(&mut self) -> &mut ChannelState {
        &mut self.right
    }

    pub fn reset(&mut self, sample_rate: u32) -> Result<()> {
        self.left.reset(sample_rate)?;
        self.right.reset(sample_rate)?;
        self.ana_snb = 0;
        self.count_tg_mismatch = 0;
        self.val_target_gain = None;
        Ok(())
    }

    pub fn set_flags(&mut self, flags: DecoderFlags) {
        self.flags = flags;
        self.left.set_flags(flags);
        self.right.set_flags(flags);
    }

    pub fn flags(&self) -> DecoderFlags {
        self.flags
    }

    /// Set the analyze mode shared by both channels. TGM is handled here, at the stereo level,
    /// since neither channel alone has the other's control code; the per-channel analyze mode is
    /// left at `Off` for TGM so [`ChannelState::step`] returns ordinary decoded audio that this
    /// coordinator then overwrites.
    pub fn set_analyze_mode(&mut self, mode: AnalyzeMode) {
        self.analyze_mode = mode;
        let per_channel = if mode == AnalyzeMode::Tgm { AnalyzeMode::Off } else { mode };
        self.left.set_analyze_mode(per_channel);
        self.right.set_analyze_mode(per_channel);
    }

    pub fn analyze_mode(&self) -> AnalyzeMode {
        self.analyze_mode
    }

    pub fn detect(&self) -> DetectionReport {
        detect::build(&[self.left.stats(), self.right.stats()])
    }

    /// Decode one interleaved stereo buffer (`[L, R, L, R, ...]`) in place. Each `(L, R)` frame is
    /// treated as a "block" for target-gain reconciliation (spec.md §4.6): after both channels
    /// have processed the frame, if both have ever accepted a packet and their current
    /// `target_gain` values disagree, `count_tg_mismatch` is incremented and, unless
    /// `TGM_LOG_OFF` is set, a line is logged the first time a run disagrees.
    pub fn process(&mut self, interleaved: &mut [i32]) {
        let mut i = 0;
        while i + 1 < interleaved.len() {
            let (l_in, r_in) = (interleaved[i], interleaved[i + 1]);

            let tgm = self.would_mismatch(l_in, r_in);
            if self.left.stats().cdt_armed
                && self.right.stats().cdt_armed
                && self.left.control().target_gain == self.right.control().target_gain
            {
                self.val_target_gain = Some(self.left.control().target_gain);
            }

            let l_out = self.left.step_with_tgm(l_in, tgm);
            let r_out = self.right.step_with_tgm(r_in, tgm);

            if tgm {
                self.count_tg_mismatch += 1;
                if !self.flags.contains(DecoderFlags::TGM_LOG_OFF) && self.count_tg_mismatch == 1 {
                    warn!("hdcd: stereo channels disagree on target_gain");
                }
            }

            if self.analyze_mode == AnalyzeMode::Tgm {
                let signal = AnalyzeSignal { target_gain_mismatch: tgm, ..Default::default() };
                let rendered = analyze::render(self.analyze_mode, &mut self.ana_snb, &signal);
                interleaved[i] = rendered;
                interleaved[i + 1] = rendered;
            }
            else {
                interleaved[i] = l_out;
                interleaved[i + 1] = r_out;
            }

            i += 2;
        }
    }

    /// Whether, for the frame about to be processed, both channels have ever armed their code
    /// detect timer and currently disagree on `target_gain`. Evaluated before stepping either
    /// channel so this reflects the state carried in from the previous sample, which is the
    /// state both channels' control engines are about to act on.
    fn would_mismatch(&self, _l_in: i32, _r_in: i32) -> bool {
        self.left.stats().cdt_armed
            && self.right.stats().cdt_armed
            && self.left.control().target_gain != self.right.control().target_gain
    }

    pub fn count_tg_mismatch(&self) -> u32 {
        self.count_tg_mismatch
    }

    /// The most recent `target_gain` both channels agreed on, or `None` if they never have.
    pub fn val_target_gain(&self) -> Option<u8> {
        self.val_target_gain
    }
}
