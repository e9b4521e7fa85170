// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A pure Rust decoder for HDCD (High Definition Compatible Digital), a backward-compatible
//! encoding that hides peak-extension, gain-scaling and transient-filtering control data in the
//! least significant bits of 16-bit PCM audio.
//!
//! The entry point for most callers is [`simple::HdcdProcessor`], which bundles a stereo decoder,
//! a detection report and the sample-format auto-detection a typical caller needs. Lower-level
//! types ([`channel::ChannelState`], [`stereo::StereoState`]) are exposed for callers integrating
//! HDCD decoding into an existing per-sample or per-channel pipeline.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Symphonia crates. Please see clippy.toml for their
// justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::excessive_precision)]
#![allow(clippy::identity_op)]
#![allow(clippy::manual_range_contains)]

pub mod analyze;
pub mod channel;
pub mod control;
pub mod detect;
mod error;
mod gain;
mod peak_extend;
mod scanner;
pub mod simple;
pub mod stereo;
mod transient;

pub use analyze::AnalyzeMode;
pub use channel::{ChannelState, DEFAULT_SUSTAIN_MS};
pub use control::{ControlCode, DecoderFlags};
pub use detect::{DetectionReport, HdcdDetected, PacketFormat, PeakExtend};
pub use error::{HdcdError, Result};
pub use simple::{ChannelLayout, HdcdProcessor};
pub use stereo::StereoState;
