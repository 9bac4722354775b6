//! Per-track decode context
//!
//! Owns the decoder chain for one scheduled file plus everything the
//! decode worker needs to turn it into output samples: the ReplayGain
//! multiplier, the fade slopes, and the interleaved sample counters
//! that make gain application deterministic.

use crate::audio::decoder::TrackDecoder;
use crate::audio::{OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::error::Result;
use crate::media::AudioFile;
use crate::playback::fader::{replay_gain_linear, TrackFade};
use crate::playback::state::StateCell;
use tracing::warn;

pub struct TrackContext {
    pub info: AudioFile,
    decoder: TrackDecoder,
    /// Current resampled block and the samples consumed from it.
    block: Vec<f32>,
    consumed: usize,
    eof: bool,
    replay_gain: f32,
    fade: TrackFade,
    /// Interleaved sample counters.
    pub total_samples: u64,
    pub samples_played: u64,
}

impl TrackContext {
    /// Open the decoder chain for a loaded file descriptor.
    pub fn new(info: AudioFile) -> Result<Self> {
        let decoder = TrackDecoder::open(&info.path)?;
        let replay_gain = replay_gain_linear(info.track_gain_db, info.track_peak);
        let fade = TrackFade::new(info.fade.as_ref(), info.duration_secs);
        let total_samples = u64::from(info.duration_secs)
            * u64::from(OUTPUT_SAMPLE_RATE)
            * OUTPUT_CHANNELS as u64;

        Ok(Self {
            info,
            decoder,
            block: Vec::new(),
            consumed: 0,
            eof: false,
            replay_gain,
            fade,
            total_samples,
            samples_played: 0,
        })
    }

    /// Samples the duration predicted beyond what actually played.
    ///
    /// Small values are resampler boundary rounding; anything past 100
    /// samples is worth a warning.
    pub fn drift(&self) -> i64 {
        self.total_samples as i64 - self.samples_played as i64
    }

    /// Fill `out` with gain-corrected samples.
    ///
    /// Returns the number of samples written (a whole number of
    /// frames). A short return means this track is exhausted; the
    /// caller finishes the period from the next track. Decode errors
    /// end the track early rather than the stream.
    pub fn extract_frames(&mut self, out: &mut [f32], state: &StateCell) -> usize {
        let mut produced = 0usize;

        while produced < out.len() && !self.eof && !state.halted() {
            if self.consumed >= self.block.len() {
                match self.decoder.next_block() {
                    Ok(Some(block)) => {
                        self.block = block;
                        self.consumed = 0;
                    }
                    Ok(None) => {
                        self.eof = true;
                        break;
                    }
                    Err(e) => {
                        warn!(
                            "decode error on {}, dropping track: {e}",
                            self.info.path.display()
                        );
                        self.eof = true;
                        break;
                    }
                }
            }

            let n = (self.block.len() - self.consumed).min(out.len() - produced);
            let src = &self.block[self.consumed..self.consumed + n];
            let dst = &mut out[produced..produced + n];

            if self.fade.is_flat(self.samples_played, n as u64, self.total_samples) {
                let gain = self.replay_gain;
                for (d, s) in dst.iter_mut().zip(src) {
                    *d = s * gain;
                }
            } else {
                for (i, (d, s)) in dst.iter_mut().zip(src).enumerate() {
                    let fader_gain = self
                        .fade
                        .gain(self.samples_played + i as u64, self.total_samples);
                    *d = s * fader_gain * self.replay_gain;
                }
            }

            self.consumed += n;
            produced += n;
            self.samples_played += n as u64;
        }

        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::state::EngineState;
    use crate::playlist::FadeInfo;
    use crate::testutil::{flat_frames, write_wav};
    use std::path::Path;

    fn info_for(path: &Path, duration_secs: u32, fade: Option<FadeInfo>) -> AudioFile {
        AudioFile {
            path: path.to_path_buf(),
            artist: None,
            album: None,
            title: None,
            album_id: None,
            release_track_id: None,
            album_gain_db: 0.0,
            album_peak: 0.0,
            track_gain_db: 0.0,
            track_peak: 0.0,
            duration_secs,
            zone_name: "test".into(),
            fade,
        }
    }

    fn drain(ctx: &mut TrackContext) -> Vec<f32> {
        let state = StateCell::new(EngineState::Playing);
        let mut out = Vec::new();
        let mut period = vec![0.0f32; 2048 * 2];
        loop {
            let n = ctx.extract_frames(&mut period, &state);
            out.extend_from_slice(&period[..n]);
            if n < period.len() {
                break;
            }
        }
        out
    }

    #[test]
    fn plays_out_within_drift_tolerance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two-secs.wav");
        write_wav(&path, 48_000, &flat_frames(48_000, 2, 8000));

        let mut ctx = TrackContext::new(info_for(&path, 2, None)).unwrap();
        let samples = drain(&mut ctx);

        assert_eq!(samples.len() as u64, ctx.samples_played);
        assert!(
            ctx.drift().abs() <= 100,
            "drift of {} samples",
            ctx.drift()
        );
    }

    #[test]
    fn fade_in_shapes_the_first_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faded.wav");
        write_wav(&path, 48_000, &flat_frames(48_000, 4, 16000));

        let fade = FadeInfo {
            fadein_secs: 2,
            fadeout_secs: 0,
            min_level: 0.0,
            max_level: 1.0,
        };
        let mut ctx = TrackContext::new(info_for(&path, 4, Some(fade))).unwrap();
        let samples = drain(&mut ctx);

        let nominal = 16000.0 / 32767.0;
        // Sample 0 is silent; by the end of the window we are at level.
        assert!(samples[0].abs() < 1e-3);
        assert!(samples[1].abs() < 1e-3);
        let after_fade = 2 * 48_000 + 4096;
        assert!((samples[after_fade] - nominal).abs() < 0.01);
        // Midway through the ramp the gain is about a half.
        let mid = 48_000; // one second of interleaved samples
        assert!((samples[mid] - nominal * 0.5).abs() < 0.02);
    }

    #[test]
    fn replay_gain_scales_flat_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gained.wav");
        write_wav(&path, 48_000, &flat_frames(48_000, 1, 8000));

        let mut info = info_for(&path, 1, None);
        info.track_gain_db = -6.0;
        let mut ctx = TrackContext::new(info).unwrap();
        let samples = drain(&mut ctx);

        let nominal = 8000.0 / 32767.0;
        let expected = nominal * 10.0f32.powf(-0.3);
        assert!((samples[1000] - expected).abs() < 1e-3);
    }

    #[test]
    fn stopping_state_cuts_extraction_short() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.wav");
        write_wav(&path, 48_000, &flat_frames(48_000, 2, 8000));

        let mut ctx = TrackContext::new(info_for(&path, 2, None)).unwrap();
        let state = StateCell::new(EngineState::Stopping);
        let mut period = vec![0.0f32; 2048 * 2];
        assert_eq!(ctx.extract_frames(&mut period, &state), 0);
    }
}
