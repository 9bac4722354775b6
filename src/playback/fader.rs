//! Gain shaping: per-track fades, ReplayGain, and the pause/resume
//! state fade.
//!
//! All gains are linear multipliers applied per sample. Track fades are
//! deterministic in the interleaved sample counter, so replaying a
//! track yields bitwise-identical output.

use crate::audio::{OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::playlist::FadeInfo;
use tracing::debug;

/// Duration of the pause/resume volume ramp.
pub const STATE_FADE_SECS: u32 = 2;

/// Per-track fade-in/out slopes, derived once at track load.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackFade {
    fade_in_slope: f32,
    fade_out_slope: f32,
    /// Interleaved-sample thresholds the slopes act within.
    fadein_limit: u64,
    fadeout_limit: u64,
}

impl TrackFade {
    /// Derive slopes from the playlist fade parameters.
    ///
    /// A duration of zero, or one at least as long as the track,
    /// disables that ramp.
    pub fn new(fade: Option<&FadeInfo>, duration_secs: u32) -> Self {
        let Some(fade) = fade else {
            return Self::default();
        };

        let mut out = Self::default();
        let rate = OUTPUT_SAMPLE_RATE as f32;

        if fade.fadein_secs > 0 && fade.fadein_secs < duration_secs {
            out.fade_in_slope = 1.0 / (rate * fade.fadein_secs as f32);
            out.fadein_limit = u64::from(fade.fadein_secs) * u64::from(OUTPUT_SAMPLE_RATE);
        }
        if fade.fadeout_secs > 0 && fade.fadeout_secs < duration_secs {
            out.fade_out_slope = 1.0 / (rate * fade.fadeout_secs as f32);
            out.fadeout_limit = u64::from(fade.fadeout_secs) * u64::from(OUTPUT_SAMPLE_RATE);
        }
        out
    }

    /// Fade gain at a given interleaved sample position.
    pub fn gain(&self, samples_played: u64, total_samples: u64) -> f32 {
        if self.fade_in_slope > 0.0 && samples_played < self.fadein_limit {
            return self.fade_in_slope * samples_played as f32;
        }
        let remaining = total_samples.saturating_sub(samples_played);
        if self.fade_out_slope > 0.0 && remaining < self.fadeout_limit {
            return self.fade_out_slope * remaining as f32;
        }
        1.0
    }

    /// Whether any sample in `[start, start + len)` falls in a ramp.
    pub fn is_flat(&self, start: u64, len: u64, total_samples: u64) -> bool {
        if self.fade_in_slope > 0.0 && start < self.fadein_limit {
            return false;
        }
        if self.fade_out_slope > 0.0
            && total_samples.saturating_sub(start + len) < self.fadeout_limit
        {
            return false;
        }
        true
    }
}

/// ReplayGain as a linear multiplier, capped by the track peak so
/// normalization can never clip.
pub fn replay_gain_linear(track_gain_db: f32, track_peak: f32) -> f32 {
    let gain = if track_gain_db != 0.0 {
        10.0f32.powf(track_gain_db / 20.0)
    } else {
        1.0
    };
    let limit = if track_peak != 0.0 {
        1.0 / track_peak
    } else {
        1.0
    };
    if gain > limit {
        debug!("limiting replay gain to peak: {limit}");
        limit
    } else {
        gain
    }
}

/// The 2-second linear ramp around pause/resume transitions.
///
/// Lives on the output callback's thread; advances only while samples
/// are actually leaving the ring. Gains are clamped to [0, 1].
pub struct StateFader {
    total_frames: u64,
    slope: f32,
    pos: u64,
    fade_in: bool,
    active: bool,
}

impl StateFader {
    pub fn new() -> Self {
        let total_frames = u64::from(OUTPUT_SAMPLE_RATE) * u64::from(STATE_FADE_SECS);
        Self {
            total_frames,
            slope: 1.0 / total_frames as f32,
            pos: 0,
            fade_in: true,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn start(&mut self, fade_in: bool) {
        self.pos = 0;
        self.fade_in = fade_in;
        self.active = true;
    }

    /// Ramp the buffer in place; true when the fade budget is spent.
    pub fn apply(&mut self, data: &mut [f32]) -> bool {
        if !self.active {
            return false;
        }

        for frame in data.chunks_exact_mut(OUTPUT_CHANNELS) {
            let gain = if self.pos >= self.total_frames {
                if self.fade_in {
                    1.0
                } else {
                    0.0
                }
            } else {
                let g = if self.fade_in {
                    self.pos as f32 * self.slope
                } else {
                    (self.total_frames - self.pos) as f32 * self.slope
                };
                self.pos += 1;
                g
            };
            let gain = gain.clamp(0.0, 1.0);
            for sample in frame {
                *sample *= gain;
            }
        }

        if self.pos >= self.total_frames {
            self.active = false;
            true
        } else {
            false
        }
    }
}

impl Default for StateFader {
    fn default() -> Self {
        Self::new()
    }
}
