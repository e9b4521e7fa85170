// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Analyze mode: replaces decoded audio with a carrier tone whose amplitude encodes a chosen
//! internal signal, for diagnosing where HDCD features are active. The carrier table is a
//! fixed, documented placeholder for the real compatibility contract (see DESIGN.md) — bit-exact
//! reproduction of the published carrier is only possible against the original reference test
//! vectors, which are not part of the material available to this implementation.

use crate::gain;

/// Which internal signal an analyze-mode carrier's amplitude encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalyzeMode {
    #[default]
    Off,
    /// Amplitude proportional to `|running_gain|`.
    Lle,
    /// Full amplitude on samples where peak extend mapped the value.
    Pe,
    /// Full amplitude while the code detect timer (`sustain`) is active.
    Cdt,
    /// Full amplitude when the stereo target gains disagree.
    Tgm,
}

/// The per-sample facts a caller must supply for the carrier to be modulated correctly; not
/// every mode reads every field.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzeSignal {
    pub running_gain: i32,
    pub peak_extend_active: bool,
    pub sustain_active: bool,
    pub target_gain_mismatch: bool,
}

const CARRIER_STEPS: usize = 8;

/// A fixed triangle-wave envelope, full scale at `1 << 16`.
const CARRIER_TABLE: [i32; CARRIER_STEPS] =
    [0, 1 << 14, 1 << 15, (1 << 15) + (1 << 14), 1 << 16, (1 << 15) + (1 << 14), 1 << 15, 1 << 14];

const CARRIER_FULL_SCALE: i32 = 1 << 16;

/// Render one carrier sample for `mode` and advance the cycling index `snb` in place.
pub fn render(mode: AnalyzeMode, snb: &mut u8, signal: &AnalyzeSignal) -> i32 {
    let carrier = CARRIER_TABLE[(*snb as usize) % CARRIER_STEPS];
    *snb = (*snb + 1) % CARRIER_STEPS as u8;

    let (numer, denom): (i64, i64) = match mode {
        AnalyzeMode::Off => return 0,
        AnalyzeMode::Lle => {
            let mag = i64::from(signal.running_gain.unsigned_abs() as i32);
            (mag.min(i64::from(gain::MAX_MAGNITUDE)), i64::from(gain::MAX_MAGNITUDE))
        }
        AnalyzeMode::Pe => (i64::from(signal.peak_extend_active), 1),
        AnalyzeMode::Cdt => (i64::from(signal.sustain_active), 1),
        AnalyzeMode::Tgm => (i64::from(signal.target_gain_mismatch), 1),
    };

    if denom == 0 {
        return 0;
    }
    ((i64::from(carrier) * numer) / denom) as i32
}

impl AnalyzeMode {
    pub fn is_off(self) -> bool {
        matches!(self, AnalyzeMode::Off)
    }
}

impl TryFrom<u8> for AnalyzeMode {
    type Error = crate::error::HdcdError;

    /// Accepts the raw integer mode values of the reference API, for callers that store the
    /// mode as a plain integer rather than matching on [`AnalyzeMode`] directly.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AnalyzeMode::Off),
            1 => Ok(AnalyzeMode::Lle),
            2 => Ok(AnalyzeMode::Pe),
            3 => Ok(AnalyzeMode::Cdt),
            4 => Ok(AnalyzeMode::Tgm),
            _ => Err(crate::error::HdcdError::InvalidAnalyzeMode),
        }
    }
}
