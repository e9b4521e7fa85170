// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-channel decoding state: the packet scanner, control code, sustain ("code detect") timer,
//! gain ramp, peak extend, transient filter, analyze mode and statistics counters wired together
//! into the single-sample control engine described in SPEC_FULL.md §4.2.

use log::{debug, trace};

use crate::analyze::{self, AnalyzeMode, AnalyzeSignal};
use crate::control::{ControlCode, DecoderFlags, PacketKind};
use crate::error::{HdcdError, Result};
use crate::gain;
use crate::peak_extend;
use crate::scanner::PacketScanner;
use crate::transient::TransientFilter;

/// How many milliseconds of silence on the code-detect timer before HDCD control reverts to
/// neutral. The published value is not in the material available to this crate; 2 seconds
/// matches the order of magnitude described in spec.md §3 ("on the order of seconds").
pub const DEFAULT_SUSTAIN_MS: u32 = 2000;

/// Raw counters accumulated by one channel. Kept separate from [`ChannelState`] so a
/// [`DetectionReport`](crate::detect::DetectionReport) can be built from a borrowed snapshot
/// without dragging in the scanner/filter/log-sink machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelStats {
    pub code_counter_a: u32,
    pub code_counter_a_almost: u32,
    pub code_counter_b: u32,
    pub code_counter_b_checkfails: u32,
    pub code_counter_c: u32,
    pub code_counter_c_unmatched: u32,
    /// Valid packets (A or B) whose control code had `peak_extend` set.
    pub count_peak_extend: u32,
    /// Valid packets (A or B) whose control code had `transient_filter` set.
    pub count_transient_filter: u32,
    pub count_sustain_expired: u32,
    /// Valid packets seen at each `target_gain` value, `0..=15`.
    pub gain_counts: [u32; 16],
    /// The largest `target_gain` ever accepted from a valid packet.
    pub max_gain: u8,
    /// Whether the code-detect timer has ever been armed (a valid packet was ever accepted).
    pub cdt_armed: bool,
}

/// One channel's decoding state.
pub struct ChannelState {
    scanner: PacketScanner,
    control: ControlCode,
    sustain: u32,
    sustain_reset: u32,
    running_gain: i32,
    flags: DecoderFlags,
    sustain_ms: u32,
    filter: TransientFilter,
    analyze_mode: AnalyzeMode,
    ana_snb: u8,
    log: Option<Box<dyn FnMut(&str) + Send>>,
    stats: ChannelStats,
}

impl ChannelState {
    pub fn new(sample_rate: u32) -> Result<Self> {
        Self::with_options(sample_rate, DEFAULT_SUSTAIN_MS, DecoderFlags::empty())
    }

    pub fn with_options(sample_rate: u32, sustain_ms: u32, flags: DecoderFlags) -> Result<Self> {
        let sustain_reset = Self::compute_sustain_reset(sample_rate, sustain_ms)?;
        Ok(ChannelState {
            scanner: PacketScanner::new(),
            control: ControlCode::NEUTRAL,
            sustain: 0,
            sustain_reset,
            running_gain: 0,
            flags,
            sustain_ms,
            filter: TransientFilter::default(),
            analyze_mode: AnalyzeMode::Off,
            ana_snb: 0,
            log: None,
            stats: ChannelStats::default(),
        })
    }

    fn compute_sustain_reset(sample_rate: u32, sustain_ms: u32) -> Result<u32> {
        if sample_rate == 0 {
            return Err(HdcdError::InvalidSampleRate);
        }
        let samples = u64::from(sample_rate) * u64::from(sustain_ms) / 1000;
        Ok(samples.min(u64::from(u32::MAX)) as u32)
    }

    /// Reset all processing state (scanner, control, sustain, gain ramp, filter, counters) for a
    /// new stream at `sample_rate`. Configuration (decoder flags, analyze mode, log sink) is
    /// preserved.
    pub fn reset(&mut self, sample_rate: u32) -> Result<()> {
        self.sustain_reset = Self::compute_sustain_reset(sample_rate, self.sustain_ms)?;
        self.scanner.reset();
        self.control = ControlCode::NEUTRAL;
        self.sustain = 0;
        self.running_gain = 0;
        self.filter.reset();
        self.ana_snb = 0;
        self.stats = ChannelStats::default();
        Ok(())
    }

    pub fn set_flags(&mut self, flags: DecoderFlags) {
        self.flags = flags;
    }

    pub fn flags(&self) -> DecoderFlags {
        self.flags
    }

    pub fn set_analyze_mode(&mut self, mode: AnalyzeMode) {
        self.analyze_mode = mode;
    }

    pub fn analyze_mode(&self) -> AnalyzeMode {
        self.analyze_mode
    }

    /// Install a sink that receives one line of text per logged event (target-gain changes,
    /// A-almost/B-checkfail anomalies, sustain expiration). Without a sink, lines go to stderr.
    pub fn set_log_sink(&mut self, sink: impl FnMut(&str) + Send + 'static) {
        self.log = Some(Box::new(sink));
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    pub fn control(&self) -> ControlCode {
        self.control
    }

    pub fn running_gain(&self) -> i32 {
        self.running_gain
    }

    pub fn sustain_active(&self) -> bool {
        self.sustain > 0
    }

    fn log_line(&mut self, line: &str) {
        match &mut self.log {
            Some(sink) => sink(line),
            None => eprintln!("{line}"),
        }
    }

    /// Process `samples`, decoding HDCD from and overwriting every `stride`-th element (so a
    /// caller can pass an interleaved buffer and a channel offset via slicing, or a stride of 1
    /// for planar data).
    pub fn process(&mut self, samples: &mut [i32], stride: usize) {
        debug_assert!(stride >= 1);
        let mut i = 0;
        while i < samples.len() {
            samples[i] = self.step(samples[i]);
            i += stride;
        }
    }

    /// Run the full per-sample control engine on one sample and return the decoded output.
    pub fn step(&mut self, sample_in: i32) -> i32 {
        self.step_with_tgm(sample_in, false)
    }

    /// As [`ChannelState::step`], but lets a stereo coordinator supply the target-gain-mismatch
    /// signal for analyze mode TGM, which only the coordinator can compute.
    pub(crate) fn step_with_tgm(&mut self, sample_in: i32, tgm: bool) -> i32 {
        let lsb = (sample_in & 1) as u32;
        let kind = self.scanner.scan(lsb);
        let accepted = matches!(kind, PacketKind::FormatA(_) | PacketKind::FormatB(_));
        self.handle_packet_kind(kind);
        if !accepted {
            self.idle_decay();
        }

        let effective_pe = self.sustain_active() && self.control.peak_extend;
        let effective_tf = self.sustain_active() && self.control.transient_filter;
        let force_pe = self.flags.contains(DecoderFlags::FORCE_PE);

        let desired = -(i32::from(self.control.target_gain) << 7);
        self.running_gain = gain::ramp_toward(self.running_gain, desired);

        let mut working = sample_in;
        if effective_pe {
            working = peak_extend::apply(working);
        }
        working = gain::apply(working, self.running_gain);
        if effective_tf {
            working = self.filter.process(working);
        }

        if self.analyze_mode.is_off() {
            return working;
        }

        // `FORCE_PE` is an analyze aid only (spec.md §3, §4.8): it reports where peak-extend
        // *would* fire even when no packet has ever enabled it, but it must never engage
        // peak-extend on real output by itself — that already happened above, gated on
        // `effective_pe` alone. Without `FORCE_PE`, the signal reports only samples peak-extend
        // actually mapped.
        let peak_extend_active = if force_pe {
            peak_extend::would_trigger(sample_in)
        }
        else {
            effective_pe && peak_extend::would_trigger(sample_in)
        };

        let signal = AnalyzeSignal {
            running_gain: self.running_gain,
            peak_extend_active,
            sustain_active: self.sustain_active(),
            target_gain_mismatch: tgm,
        };
        analyze::render(self.analyze_mode, &mut self.ana_snb, &signal)
    }

    fn handle_packet_kind(&mut self, kind: PacketKind) {
        match kind {
            PacketKind::None => {}
            PacketKind::FormatA(code) => {
                self.stats.code_counter_a += 1;
                self.stats.code_counter_c += 1;
                self.accept(code);
            }
            PacketKind::AAlmost => {
                self.stats.code_counter_a_almost += 1;
                trace!("hdcd: A-almost (expected-zero bit set)");
            }
            PacketKind::FormatB(code) => {
                self.stats.code_counter_b += 1;
                self.stats.code_counter_c += 1;
                self.accept(code);
            }
            PacketKind::BCheckFail => {
                self.stats.code_counter_b_checkfails += 1;
                trace!("hdcd: format B XOR check failed");
            }
            PacketKind::Unmatched => {
                self.stats.code_counter_c += 1;
                self.stats.code_counter_c_unmatched += 1;
                trace!("hdcd: prefix matched, code unrecognized");
            }
        }
    }

    fn accept(&mut self, code: ControlCode) {
        if code != self.control {
            self.log_line(&format!(
                "hdcd: target_gain -> {:.1} dB (peak_extend={}, transient_filter={})",
                code.target_gain_db(),
                code.peak_extend,
                code.transient_filter
            ));
        }
        self.control = code;
        self.sustain = self.sustain_reset;
        self.stats.cdt_armed = true;
        if code.peak_extend {
            self.stats.count_peak_extend += 1;
        }
        if code.transient_filter {
            self.stats.count_transient_filter += 1;
        }
        self.stats.gain_counts[code.target_gain as usize] += 1;
        self.stats.max_gain = self.stats.max_gain.max(code.target_gain);
    }

    fn idle_decay(&mut self) {
        if self.sustain == 0 {
            return;
        }
        self.sustain -= 1;
        if self.sustain == 0 {
            self.stats.count_sustain_expired += 1;
            self.control = ControlCode::NEUTRAL;
            debug!("hdcd: code detect timer expired, reverting to neutral control");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect;
    use crate::scanner::test_support::encode_format_a;

    fn feed_bits(channel: &mut ChannelState, bits: &[u32]) {
        for &b in bits {
            channel.step((b & 1) as i32);
        }
    }

    #[test]
    fn reset_is_pure() {
        let mut channel = ChannelState::new(44_100).unwrap();
        let code = ControlCode { target_gain: 4, peak_extend: true, transient_filter: true };
        feed_bits(&mut channel, &encode_format_a(code));
        for _ in 0..50 {
            channel.step(0);
        }
        assert_ne!(channel.running_gain(), 0);

        channel.reset(44_100).unwrap();
        assert_eq!(channel.running_gain(), 0);
        assert_eq!(channel.control(), ControlCode::NEUTRAL);
        assert!(!channel.sustain_active());
        assert_eq!(channel.stats(), &ChannelStats::default());
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert_eq!(ChannelState::new(0).unwrap_err(), HdcdError::InvalidSampleRate);
    }

    #[test]
    fn silence_passes_through_unchanged() {
        let mut channel = ChannelState::new(44_100).unwrap();
        for _ in 0..1000 {
            assert_eq!(channel.step(0), 0);
        }
        assert_eq!(channel.stats().code_counter_a, 0);
        assert_eq!(channel.stats().code_counter_b, 0);
    }

    #[test]
    fn accepting_a_packet_arms_sustain_and_counters() {
        let mut channel = ChannelState::new(44_100).unwrap();
        let code = ControlCode { target_gain: 2, peak_extend: true, transient_filter: false };
        feed_bits(&mut channel, &encode_format_a(code));

        assert_eq!(channel.stats().code_counter_a, 1);
        assert_eq!(channel.stats().code_counter_c, 1);
        assert_eq!(channel.stats().count_peak_extend, 1);
        assert_eq!(channel.stats().gain_counts[2], 1);
        assert_eq!(channel.stats().max_gain, 2);
        assert!(channel.stats().cdt_armed);
        assert!(channel.sustain_active());
        assert_eq!(channel.control(), code);
    }

    #[test]
    fn sustain_expires_after_reset_interval_and_clears_control() {
        let mut channel = ChannelState::with_options(1000, 10, DecoderFlags::empty()).unwrap();
        let code = ControlCode { target_gain: 6, peak_extend: false, transient_filter: false };
        feed_bits(&mut channel, &encode_format_a(code));
        let sustain_value = 1000u32 * 10 / 1000;

        for _ in 0..(sustain_value as usize + 5) {
            channel.step(0);
        }

        assert_eq!(channel.stats().count_sustain_expired, 1);
        assert_eq!(channel.control(), ControlCode::NEUTRAL);
        assert!(!channel.sustain_active());
    }

    #[test]
    fn gain_ramps_toward_target_over_time() {
        let mut channel = ChannelState::new(44_100).unwrap();
        let code = ControlCode { target_gain: 4, peak_extend: false, transient_filter: false };
        feed_bits(&mut channel, &encode_format_a(code));
        let target = -(4i32 << 7);
        for _ in 0..(target.unsigned_abs() as usize + 10) {
            channel.step(0);
        }
        assert_eq!(channel.running_gain(), target);
    }

    // Scenario 1: all-zero input produces an untouched report and untouched samples.
    #[test]
    fn scenario_all_zero_input_is_silent() {
        let mut channel = ChannelState::new(44_100).unwrap();
        for _ in 0..10_000 {
            assert_eq!(channel.step(0), 0);
        }
        let report = detect::build(&[channel.stats()]);
        assert_eq!(report.hdcd_detected, detect::HdcdDetected::None);
    }

    // Scenario 2: a single impulse with no HDCD prefix passes straight through.
    #[test]
    fn scenario_impulse_passes_through() {
        let mut channel = ChannelState::new(44_100).unwrap();
        let mut samples = vec![0i32; 2000];
        samples[0] = 0x10000;
        channel.process(&mut samples, 1);
        assert_eq!(samples[0], 0x10000);
        assert!(samples[1..].iter().all(|&s| s == 0));
        let report = detect::build(&[channel.stats()]);
        assert_eq!(report.hdcd_detected, detect::HdcdDetected::None);
    }

    // Scenario 3: a neutral format A packet (0 dB, PE off, TF off) is detected but has no effect.
    #[test]
    fn scenario_neutral_packet_is_detected_but_no_effect() {
        let mut channel = ChannelState::new(44_100).unwrap();
        channel.process(&mut vec![0i32; 100], 1);
        feed_bits(&mut channel, &encode_format_a(ControlCode::NEUTRAL));

        let report = detect::build(&[channel.stats()]);
        assert_eq!(report.total_packets, 1);
        assert_eq!(report.packet_type, detect::PacketFormat::A);
        assert_eq!(report.peak_extend, detect::PeakExtend::Never);
        assert_eq!(report.max_gain_adjustment, 0.0);
        assert_eq!(report.hdcd_detected, detect::HdcdDetected::NoEffect);
    }

    // Scenario 4: same, but peak_extend on: effectual and permanent (the only packet had PE set).
    #[test]
    fn scenario_pe_packet_is_effectual() {
        let mut channel = ChannelState::new(44_100).unwrap();
        channel.process(&mut vec![0i32; 100], 1);
        let code = ControlCode { target_gain: 0, peak_extend: true, transient_filter: false };
        feed_bits(&mut channel, &encode_format_a(code));

        let report = detect::build(&[channel.stats()]);
        assert_eq!(report.peak_extend, detect::PeakExtend::Permanent);
        assert_eq!(report.hdcd_detected, detect::HdcdDetected::Effectual);
    }

    // Scenario 5: two packets, 0 dB then 6 (-3.0 dB), 1000 samples apart; running_gain ramps to
    // the new target by exactly one LSB per sample and never overshoots.
    #[test]
    fn scenario_gain_reaches_target_by_exactly_one_lsb_per_sample() {
        let mut channel = ChannelState::new(44_100).unwrap();
        feed_bits(&mut channel, &encode_format_a(ControlCode::NEUTRAL));
        channel.process(&mut vec![0i32; 1000], 1);

        let code = ControlCode { target_gain: 6, peak_extend: false, transient_filter: false };
        feed_bits(&mut channel, &encode_format_a(code));

        let target = -(6i32 << 7);
        assert_eq!(target, -768);

        // The accepting sample (the packet's last bit) already applies the first decrement, so
        // the target is reached one sample sooner than its raw magnitude in further steps.
        let mut steps = 0u32;
        while channel.running_gain() != target {
            channel.step(0);
            steps += 1;
            assert!(steps <= target.unsigned_abs());
        }
        assert_eq!(steps, target.unsigned_abs() - 1);
        // Reached, it holds steady.
        channel.step(0);
        assert_eq!(channel.running_gain(), target);

        let report = detect::build(&[channel.stats()]);
        assert_eq!(report.max_gain_adjustment, -3.0);
    }

    #[test]
    fn force_pe_does_not_alter_real_output_when_analyze_is_off() {
        let mut forced = ChannelState::new(44_100).unwrap();
        forced.set_flags(DecoderFlags::FORCE_PE);
        let mut plain = ChannelState::new(44_100).unwrap();

        // A loud, PE-threshold-crossing sample with no packet ever accepted on either channel:
        // peak-extend is not enabled by any control code, so `FORCE_PE` being set must not
        // change the decoded sample at all.
        let loud = i32::from(i16::MAX) - 1;
        assert_eq!(forced.step(loud), plain.step(loud));
    }

    #[test]
    fn force_pe_reports_would_trigger_in_analyze_mode_even_when_pe_was_never_enabled() {
        use crate::analyze::AnalyzeMode;

        let mut channel = ChannelState::new(44_100).unwrap();
        channel.set_flags(DecoderFlags::FORCE_PE);
        channel.set_analyze_mode(AnalyzeMode::Pe);

        // No packet has ever been accepted, so `effective_pe` is false throughout; only
        // `FORCE_PE` can make the carrier report this sample as a PE hit. The carrier's first
        // step is always zero regardless of the signal, so check the second.
        let loud = i32::from(i16::MAX) - 1;
        channel.step(loud);
        let rendered = channel.step(loud);
        assert_ne!(rendered, 0);
    }

    #[test]
    fn analyze_pe_signal_is_silent_without_force_pe_or_an_enabling_packet() {
        use crate::analyze::AnalyzeMode;

        let mut channel = ChannelState::new(44_100).unwrap();
        channel.set_analyze_mode(AnalyzeMode::Pe);

        let loud = i32::from(i16::MAX) - 1;
        let rendered = channel.step(loud);
        assert_eq!(rendered, 0);
    }

    // Scenario 6: a corrupted format B XOR check is counted as an error but never as a packet.
    #[test]
    fn scenario_corrupted_xor_is_an_error_not_a_packet() {
        use crate::scanner::test_support::encode_format_b_bad_xor;

        let mut channel = ChannelState::new(44_100).unwrap();
        let code = ControlCode { target_gain: 3, peak_extend: false, transient_filter: false };
        feed_bits(&mut channel, &encode_format_b_bad_xor(code));

        let report = detect::build(&[channel.stats()]);
        assert_eq!(channel.stats().code_counter_b_checkfails, 1);
        assert_eq!(report.total_packets, 0);
        assert!(report.errors >= 1);
        assert_eq!(report.hdcd_detected, detect::HdcdDetected::None);
    }
}
