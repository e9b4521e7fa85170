// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::error::Error;
use std::fmt;

/// Errors returned by the small set of synchronous configuration entry points.
///
/// The decoding hot path (`ChannelState::step`/`process`) never returns an error: bad packets,
/// XOR failures and sustain expirations are data-path anomalies recorded as counters, not
/// failures (see `DetectionReport`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HdcdError {
    /// An analyze mode value outside the defined set was requested.
    InvalidAnalyzeMode,
    /// A sample rate of zero was supplied; `sustain_reset` cannot be derived from it.
    InvalidSampleRate,
}

impl fmt::Display for HdcdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HdcdError::InvalidAnalyzeMode => write!(f, "invalid analyze mode"),
            HdcdError::InvalidSampleRate => write!(f, "invalid sample rate"),
        }
    }
}

impl Error for HdcdError {}

pub type Result<T> = std::result::Result<T, HdcdError>;
