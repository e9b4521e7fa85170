// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Peak extend: a piecewise-linear expansion of samples near full scale, recovering headroom
//! compressed during CD mastering. The threshold and slope below are a fixed, documented
//! placeholder for the real compatibility contract (see DESIGN.md, "Open Question: wire-format
//! constants" — the same caveat applies to the peak-extend constants as to the packet prefixes).

/// Samples at or below this magnitude (in the original 16-bit sample's scale) pass unchanged.
pub const THRESHOLD: i32 = 0x6000;

/// Samples above the threshold are expanded by this integer slope.
pub const SLOPE: i32 = 8;

/// The extended 20-bit full scale samples saturate to once peak extend is active.
pub const EXTENDED_FULL_SCALE: i32 = 1 << 19;

/// Apply the peak-extend mapping to a pre-gain sample.
pub fn apply(sample: i32) -> i32 {
    let mag = i64::from(sample).unsigned_abs() as i64;
    if mag <= i64::from(THRESHOLD) {
        return sample;
    }
    let expanded = i64::from(THRESHOLD) + (mag - i64::from(THRESHOLD)) * i64::from(SLOPE);
    let clamped = expanded.min(i64::from(EXTENDED_FULL_SCALE));
    let signed = if sample < 0 { -clamped } else { clamped };
    signed.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// True if peak extend would alter this sample, independent of whether PE is actually enabled.
/// Used by analyze mode's PE signal and the `FORCE_PE` decoder option.
pub fn would_trigger(sample: i32) -> bool {
    i64::from(sample).unsigned_abs() as i64 > i64::from(THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_unchanged() {
        assert_eq!(apply(0), 0);
        assert_eq!(apply(THRESHOLD), THRESHOLD);
        assert_eq!(apply(-THRESHOLD), -THRESHOLD);
    }

    #[test]
    fn above_threshold_expands_and_is_sign_preserving() {
        let out = apply(THRESHOLD + 100);
        assert_eq!(out, THRESHOLD + 100 * SLOPE);
        let out_neg = apply(-(THRESHOLD + 100));
        assert_eq!(out_neg, -(THRESHOLD + 100 * SLOPE));
    }

    #[test]
    fn saturates_at_extended_full_scale() {
        assert_eq!(apply(i32::MAX), EXTENDED_FULL_SCALE);
        assert_eq!(apply(i32::MIN + 1), -EXTENDED_FULL_SCALE);
    }

    #[test]
    fn would_trigger_matches_apply_threshold() {
        assert!(!would_trigger(THRESHOLD));
        assert!(would_trigger(THRESHOLD + 1));
    }
}
