//! # aircast
//!
//! Unattended radio-broadcast audio player.
//!
//! A weekly schedule of time-zoned playlists is rendered as a single
//! continuous stereo PCM stream at 48 kHz: tracks are decoded, resampled,
//! level-normalized (ReplayGain) and faded into each other without gaps,
//! while a tiny HTTP endpoint reports what is on air.
//!
//! **Architecture:** symphonia + rubato + cpal, with a lock-free sample
//! ring between the decode worker and the real-time output callback.

pub mod audio;
pub mod config;
pub mod error;
pub mod logging;
pub mod media;
pub mod playback;
pub mod playlist;
pub mod schedule;
pub mod server;
pub mod signals;
pub mod status;
pub mod util;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{Error, Result};
