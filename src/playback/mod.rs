//! Playback engine
//!
//! Three cooperating activities around a lock-free sample ring: the
//! schedule worker pre-loads tracks one ahead, the decode worker turns
//! them into gain-corrected periods, and the real-time output callback
//! drains the ring into the device buffer.

pub mod engine;
pub mod fader;
pub mod ring;
pub mod state;
pub mod track;

/// Frames the decode worker writes to the ring at a time.
pub const PERIOD_FRAMES: usize = 2048;

/// Ring capacity in seconds of output audio.
pub const RING_SECONDS: usize = 4;
