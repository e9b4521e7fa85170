// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The transient filter: a two-stage integer IIR applied per sample when a control packet's
//! transient bit is set and sustained. Coefficients are a fixed, documented placeholder for the
//! real compatibility contract (see DESIGN.md); the surrounding integer-only structure (direct
//! form I, Q14 coefficients, round-and-shift) is the part of this module that matters for a
//! conformant implementation.

const FILTER_SHIFT: u32 = 14;
const ROUNDING: i64 = 1 << (FILTER_SHIFT - 1);

/// One direct-form-I first order stage: `y = (a0*x + a1*x_prev - b1*y_prev) >> FILTER_SHIFT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Stage {
    x_prev: i32,
    y_prev: i32,
}

impl Stage {
    fn process(&mut self, x: i32, a0: i32, a1: i32, b1: i32) -> i32 {
        let acc = i64::from(a0) * i64::from(x) + i64::from(a1) * i64::from(self.x_prev)
            - i64::from(b1) * i64::from(self.y_prev)
            + ROUNDING;
        let y = (acc >> FILTER_SHIFT).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
        self.x_prev = x;
        self.y_prev = y;
        y
    }
}

/// Coefficients for the first stage (mild transient emphasis).
const STAGE0_A0: i32 = 17000;
const STAGE0_A1: i32 = -2800;
const STAGE0_B1: i32 = 1384;

/// Coefficients for the second stage (settles the first stage's overshoot).
const STAGE1_A0: i32 = 16600;
const STAGE1_A1: i32 = -2200;
const STAGE1_B1: i32 = 900;

/// Two cascaded [`Stage`]s: four signed accumulators total, per spec.md §3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransientFilter {
    stage0: Stage,
    stage1: Stage,
}

impl TransientFilter {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn process(&mut self, sample: i32) -> i32 {
        let s0 = self.stage0.process(sample, STAGE0_A0, STAGE0_A1, STAGE0_B1);
        self.stage1.process(s0, STAGE1_A0, STAGE1_A1, STAGE1_B1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_state() {
        let mut f = TransientFilter::default();
        f.process(12345);
        f.reset();
        assert_eq!(f, TransientFilter::default());
    }

    #[test]
    fn zero_input_stays_zero() {
        let mut f = TransientFilter::default();
        for _ in 0..100 {
            assert_eq!(f.process(0), 0);
        }
    }

    #[test]
    fn is_deterministic_and_integer_only() {
        let mut a = TransientFilter::default();
        let mut b = TransientFilter::default();
        let signal = [0, 1000, -500, 20000, -20000, 0, 5, -5];
        for &s in &signal {
            assert_eq!(a.process(s), b.process(s));
        }
    }
}
