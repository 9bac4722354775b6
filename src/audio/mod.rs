//! Audio I/O building blocks: streaming decode, resample, and the
//! output device wrapper.
//!
//! Everything downstream of the decoder works in one fixed format:
//! interleaved 32-bit float stereo at 48 kHz, channel order L,R.

pub mod decoder;
pub mod output;
pub mod resampler;

/// Fixed output sample rate for the whole pipeline.
pub const OUTPUT_SAMPLE_RATE: u32 = 48_000;

/// Fixed output channel count (stereo, L then R).
pub const OUTPUT_CHANNELS: usize = 2;
