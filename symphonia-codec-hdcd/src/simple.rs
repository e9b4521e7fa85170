// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A convenience wrapper bundling a mono or stereo decoder with a detection report and automatic
//! handling of the two common sample containers callers hand in: the original signed 16-bit
//! value sign-extended directly into an `i32` (bit 0 carries the HDCD LSB, the primary
//! convention used throughout this crate), or that same value pre-shifted left by 16 bits into
//! the upper half of a wider container. The latter is detected automatically, the same way the
//! reference's simplified entry point does, rather than requiring the caller to get it right.

use crate::analyze::AnalyzeMode;
use crate::channel::ChannelState;
use crate::control::DecoderFlags;
use crate::detect::{self, DetectionReport};
use crate::error::Result;
use crate::stereo::StereoState;

/// How many channels a [`HdcdProcessor`] decodes, and whether they're coordinated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
    /// Two channels, decoded jointly (target-gain mismatch detection, shared TGM analyze mode).
    Stereo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleFormat {
    /// Bit 0 of the sample value carries the HDCD LSB directly (the primary convention).
    Native,
    /// The original 16-bit value occupies bits 16..32; bits 0..16 are always zero. Detected when
    /// an entire probe window has zero low bits, which real 16-bit (or HDCD) audio essentially
    /// never does.
    PreShifted,
}

fn detect_sample_format(samples: &[i32]) -> SampleFormat {
    if !samples.is_empty() && samples.iter().all(|&s| s & 0xffff == 0) {
        SampleFormat::PreShifted
    }
    else {
        SampleFormat::Native
    }
}

enum Inner {
    Mono(Box<ChannelState>),
    Stereo(Box<StereoState>),
}

/// A ready-to-use HDCD decoder for a mono or stereo stream.
pub struct HdcdProcessor {
    inner: Inner,
    layout: ChannelLayout,
    sample_format: Option<SampleFormat>,
}

impl HdcdProcessor {
    /// As `hdcd_new`/`_hdcd_simple_reset` in the reference, a [`ChannelLayout::Stereo`] processor
    /// defaults to `TGM_LOG_OFF` set: the simplified single-call API is not expected to have a
    /// caller-supplied log sink wired up, so the one cross-channel warning it could emit is
    /// suppressed by default rather than going to stderr unexpectedly.
    pub fn new(sample_rate: u32, layout: ChannelLayout) -> Result<Self> {
        let inner = match layout {
            ChannelLayout::Mono => Inner::Mono(Box::new(ChannelState::new(sample_rate)?)),
            ChannelLayout::Stereo => {
                let mut stereo = StereoState::new(sample_rate)?;
                stereo.set_flags(DecoderFlags::TGM_LOG_OFF);
                Inner::Stereo(Box::new(stereo))
            }
        };
        Ok(HdcdProcessor { inner, layout, sample_format: None })
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn reset(&mut self, sample_rate: u32) -> Result<()> {
        self.sample_format = None;
        match &mut self.inner {
            Inner::Mono(channel) => channel.reset(sample_rate),
            Inner::Stereo(stereo) => stereo.reset(sample_rate),
        }
    }

    pub fn set_flags(&mut self, flags: DecoderFlags) {
        match &mut self.inner {
            Inner::Mono(channel) => channel.set_flags(flags),
            Inner::Stereo(stereo) => stereo.set_flags(flags),
        }
    }

    pub fn flags(&self) -> DecoderFlags {
        match &self.inner {
            Inner::Mono(channel) => channel.flags(),
            Inner::Stereo(stereo) => stereo.flags(),
        }
    }

    pub fn set_analyze_mode(&mut self, mode: AnalyzeMode) {
        match &mut self.inner {
            Inner::Mono(channel) => channel.set_analyze_mode(mode),
            Inner::Stereo(stereo) => stereo.set_analyze_mode(mode),
        }
    }

    /// As [`HdcdProcessor::set_analyze_mode`], but accepts the raw integer mode values of the
    /// reference API.
    pub fn set_analyze_mode_raw(&mut self, mode: u8) -> Result<()> {
        let mode = AnalyzeMode::try_from(mode)?;
        self.set_analyze_mode(mode);
        Ok(())
    }

    pub fn detect(&self) -> DetectionReport {
        match &self.inner {
            Inner::Mono(channel) => detect::build(&[channel.stats()]),
            Inner::Stereo(stereo) => stereo.detect(),
        }
    }

    pub fn summary(&self) -> String {
        self.detect().summary()
    }

    /// Decode `samples` in place. For [`ChannelLayout::Stereo`] this is an interleaved `[L, R,
    /// L, R, ...]` buffer; for [`ChannelLayout::Mono`], a plain sample sequence.
    ///
    /// The sample container (native vs. pre-shifted-by-16) is probed once, on the first call,
    /// from this call's buffer, and reused for the processor's lifetime.
    pub fn process(&mut self, samples: &mut [i32]) {
        let format = *self.sample_format.get_or_insert_with(|| detect_sample_format(samples));
        if format == SampleFormat::PreShifted {
            for s in samples.iter_mut() {
                *s >>= 16;
            }
        }

        match &mut self.inner {
            Inner::Mono(channel) => channel.process(samples, 1),
            Inner::Stereo(stereo) => stereo.process(samples),
        }

        if format == SampleFormat::PreShifted {
            for s in samples.iter_mut() {
                *s <<= 16;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlCode;
    use crate::scanner::test_support::encode_format_a;

    #[test]
    fn mono_silence_round_trips() {
        let mut proc = HdcdProcessor::new(44_100, ChannelLayout::Mono).unwrap();
        let mut buf = vec![0i32; 64];
        proc.process(&mut buf);
        assert!(buf.iter().all(|&s| s == 0));
        assert_eq!(proc.detect().hdcd_detected, detect::HdcdDetected::None);
    }

    #[test]
    fn detects_and_undoes_pre_shifted_containers() {
        let mut proc = HdcdProcessor::new(44_100, ChannelLayout::Mono).unwrap();
        let code = ControlCode { target_gain: 2, peak_extend: false, transient_filter: false };
        let mut buf: Vec<i32> =
            encode_format_a(code).iter().map(|&b| (b as i32) << 16).collect();
        buf.extend(std::iter::repeat(0i32).take(64));

        proc.process(&mut buf);

        // The container convention (zero low 16 bits) is preserved in the output.
        assert!(buf.iter().all(|&s| s & 0xffff == 0));
        assert_eq!(proc.detect().total_packets, 1);
    }

    #[test]
    fn reset_clears_sample_format_probe() {
        let mut proc = HdcdProcessor::new(44_100, ChannelLayout::Mono).unwrap();
        let mut buf = vec![1i32 << 16; 8];
        proc.process(&mut buf);
        assert_eq!(proc.sample_format, Some(SampleFormat::PreShifted));
        proc.reset(44_100).unwrap();
        assert_eq!(proc.sample_format, None);
    }

    #[test]
    fn stereo_layout_defaults_to_tgm_log_off() {
        let stereo = HdcdProcessor::new(44_100, ChannelLayout::Stereo).unwrap();
        assert!(stereo.flags().contains(DecoderFlags::TGM_LOG_OFF));

        // Mono has no cross-channel mismatch to suppress; it carries no default flags.
        let mono = HdcdProcessor::new(44_100, ChannelLayout::Mono).unwrap();
        assert!(!mono.flags().contains(DecoderFlags::TGM_LOG_OFF));
    }

    #[test]
    fn invalid_raw_analyze_mode_is_rejected() {
        let mut proc = HdcdProcessor::new(44_100, ChannelLayout::Mono).unwrap();
        assert!(proc.set_analyze_mode_raw(200).is_err());
    }
}
