// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The gain ramp: an 11-bit signed fixed-point (3.8) `running_gain` that smoothly approaches a
//! target dB value one LSB per sample, and the fixed-point multiply that applies it.

use once_cell::sync::Lazy;

/// The largest magnitude `running_gain` can take: `target_gain` maxes out at 15 (-7.5 dB), and
/// the desired value is `-target_gain << 7`.
pub const MAX_MAGNITUDE: i32 = 15 << 7;

const GAIN_SHIFT: u32 = 23;

/// `gain_factor_table[mag]` is `round(10^(-mag / 5120) * 2^GAIN_SHIFT)`: a Q23 fixed-point linear
/// gain for the dB value `-mag / 256`. Built once with floating point (the reference's
/// "lookup/derivation" in spec.md §4.3); the per-sample multiply itself is pure integer
/// arithmetic, following the same `Lazy<[T; N]>` table-construction idiom used for FFT twiddle
/// factors elsewhere in this workspace.
static GAIN_FACTOR_TABLE: Lazy<Vec<i64>> = Lazy::new(|| {
    (0..=MAX_MAGNITUDE)
        .map(|mag| {
            // running_gain / 256 is the dB value (see spec.md §4.3); gain_factor scales by
            // 10^(dB / 20).
            let db = -f64::from(mag) / 256.0;
            let linear = 10f64.powf(db / 20.0);
            (linear * f64::from(1i64 << GAIN_SHIFT) as f64).round() as i64
        })
        .collect()
});

fn gain_factor(running_gain: i32) -> i64 {
    let mag = (-running_gain).clamp(0, MAX_MAGNITUDE) as usize;
    GAIN_FACTOR_TABLE[mag]
}

/// Move `running_gain` one LSB toward `desired`, never overshooting. `desired` is
/// `-(target_gain << 7)` as computed by the caller from the current control code.
pub fn ramp_toward(running_gain: i32, desired: i32) -> i32 {
    use std::cmp::Ordering;
    match running_gain.cmp(&desired) {
        Ordering::Less => running_gain + 1,
        Ordering::Greater => running_gain - 1,
        Ordering::Equal => running_gain,
    }
}

/// `out = (sample * gain_factor + rounding) >> GAIN_SHIFT`, saturating to `i32`.
pub fn apply(sample: i32, running_gain: i32) -> i32 {
    let factor = gain_factor(running_gain);
    let rounding = 1i64 << (GAIN_SHIFT - 1);
    let product = i64::from(sample) * factor + rounding;
    let out = product >> GAIN_SHIFT;
    out.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
