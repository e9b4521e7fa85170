// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Detection and statistics reporting: aggregates per-channel counters into a single summary a
//! caller can inspect at any time.

use crate::channel::ChannelStats;

/// Whether HDCD encoding was detected, and whether it changed the decoded audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HdcdDetected {
    /// No valid HDCD packets were ever seen.
    #[default]
    None,
    /// HDCD packets appear, but every control code was a no-op (0 dB, PE off, TF off).
    NoEffect,
    /// HDCD packets appear and changed the output in some way.
    Effectual,
}

/// Which packet format(s) were observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PacketFormat {
    #[default]
    None,
    A,
    B,
    /// Both formats were seen; in practice this indicates a decoding error somewhere.
    Mix,
}

/// How consistently peak extend was enabled across valid packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeakExtend {
    #[default]
    Never,
    Intermittent,
    Permanent,
}

/// A point-in-time summary of everything observed by one or two channel decoders.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DetectionReport {
    pub hdcd_detected: HdcdDetected,
    pub packet_type: PacketFormat,
    /// Total valid packets (format A + format B) across all channels.
    pub total_packets: u32,
    /// Total detectable errors (A-almost + B-checkfail + C-unmatched) across all channels.
    pub errors: u32,
    pub peak_extend: PeakExtend,
    pub uses_transient_filter: bool,
    /// In dB, always in `-7.5..=0.0`.
    pub max_gain_adjustment: f32,
    /// `-1`: the code detect timer was never armed on any channel. `0`: armed, never expired.
    /// Positive: the combined expiration count.
    pub cdt_expirations: i32,

    _active_count: u32,
}

fn target_gain_to_db(target_gain: u8) -> f32 {
    -0.5 * f32::from(target_gain)
}

/// Build a [`DetectionReport`] from one or more channels' statistics. Pure and idempotent: it
/// reads current counters only, and never mutates state, so calling it repeatedly without
/// processing more samples yields byte-identical reports.
pub fn build(channels: &[&ChannelStats]) -> DetectionReport {
    let total_a: u32 = channels.iter().map(|c| c.code_counter_a).sum();
    let total_b: u32 = channels.iter().map(|c| c.code_counter_b).sum();
    let total_packets = total_a + total_b;

    let errors: u32 = channels
        .iter()
        .map(|c| c.code_counter_a_almost + c.code_counter_b_checkfails + c.code_counter_c_unmatched)
        .sum();

    let packet_type = match (total_a > 0, total_b > 0) {
        (true, true) => PacketFormat::Mix,
        (true, false) => PacketFormat::A,
        (false, true) => PacketFormat::B,
        (false, false) => PacketFormat::None,
    };

    let total_pe: u32 = channels.iter().map(|c| c.count_peak_extend).sum();
    let peak_extend = if total_packets == 0 || total_pe == 0 {
        PeakExtend::Never
    }
    else if total_pe == total_packets {
        PeakExtend::Permanent
    }
    else {
        PeakExtend::Intermittent
    };

    let uses_transient_filter = channels.iter().any(|c| c.count_transient_filter > 0);

    let max_gain = channels.iter().map(|c| c.max_gain).max().unwrap_or(0);
    let max_gain_adjustment = -target_gain_to_db(max_gain).abs();

    let any_armed = channels.iter().any(|c| c.cdt_armed);
    let cdt_expirations = if !any_armed {
        -1
    }
    else {
        channels.iter().map(|c| c.count_sustain_expired as i32).sum()
    };

    let no_gain_change = max_gain == 0;
    let no_pe = total_pe == 0;
    let no_tf = !uses_transient_filter;

    let hdcd_detected = if total_packets == 0 {
        HdcdDetected::None
    }
    else if no_gain_change && no_pe && no_tf {
        HdcdDetected::NoEffect
    }
    else {
        HdcdDetected::Effectual
    };

    let active_count = channels
        .iter()
        .map(|c| c.count_peak_extend + c.count_transient_filter + u32::from(c.max_gain > 0))
        .sum();

    DetectionReport {
        hdcd_detected,
        packet_type,
        total_packets,
        errors,
        peak_extend,
        uses_transient_filter,
        max_gain_adjustment,
        cdt_expirations,
        _active_count: active_count,
    }
}

impl DetectionReport {
    /// A single-line human summary, e.g.
    /// `"hdcd: effectual, format=A, packets=2, errors=0, pe=permanent, tf=no, max_gain=-3.0dB, cdt_expirations=0"`.
    pub fn summary(&self) -> String {
        let detected = match self.hdcd_detected {
            HdcdDetected::None => "none",
            HdcdDetected::NoEffect => "no-effect",
            HdcdDetected::Effectual => "effectual",
        };
        let format = match self.packet_type {
            PacketFormat::None => "none",
            PacketFormat::A => "A",
            PacketFormat::B => "B",
            PacketFormat::Mix => "mix",
        };
        let pe = match self.peak_extend {
            PeakExtend::Never => "never",
            PeakExtend::Intermittent => "intermittent",
            PeakExtend::Permanent => "permanent",
        };
        format!(
            "hdcd: {detected}, format={format}, packets={packets}, errors={errors}, \
             pe={pe}, tf={tf}, max_gain={gain:.1}dB, cdt_expirations={cdt}",
            detected = detected,
            format = format,
            packets = self.total_packets,
            errors = self.errors,
            pe = pe,
            tf = if self.uses_transient_filter { "yes" } else { "no" },
            gain = self.max_gain_adjustment,
            cdt = self.cdt_expirations,
        )
    }
}
