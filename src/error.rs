//! Error types for aircast
//!
//! Module-specific error variants using thiserror. The general policy:
//! anything disk-related falls forward (skip the file, fall back to the
//! next playlist level, keep the previous config), while anything that
//! breaks the output invariant (no audio at all, no output stream) is
//! fatal and stops the engine.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for aircast
#[derive(Error, Debug)]
pub enum Error {
    /// Schedule configuration is invalid (fatal on initial load only)
    #[error("Config error: {0}")]
    Config(String),

    /// Config file could not be re-read or re-parsed (previous kept)
    #[error("Config reload failed: {path}: {reason}")]
    ConfigReload { path: PathBuf, reason: String },

    /// Playlist file could not be parsed or produced no items
    #[error("Playlist error: {path}: {reason}")]
    Playlist { path: PathBuf, reason: String },

    /// A scheduled media file failed the access check
    #[error("File unreadable: {0}")]
    FileUnreadable(PathBuf),

    /// Demuxer/decoder open or strict-scan failure for a media file
    #[error("Media load failed: {path}: {reason}")]
    MediaLoad { path: PathBuf, reason: String },

    /// Codec error while a track is on air (drops the track only)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Every playlist level of the selected zone came up empty
    #[error("Scheduler has nothing to play")]
    SchedulerEmpty,

    /// Audio device / stream errors (fatal at init)
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Playback engine state errors
    #[error("Playback error: {0}")]
    Playback(String),

    /// Status endpoint errors
    #[error("Status endpoint error: {0}")]
    Status(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using the aircast Error
pub type Result<T> = std::result::Result<T, Error>;
