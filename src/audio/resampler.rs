//! Streaming resampler to the fixed 48 kHz output rate.
//!
//! rubato's fixed-input resamplers want equal-sized chunks, while the
//! decoder hands over whatever a packet happened to contain, so input
//! is staged in planar backlogs and processed one chunk at a time.
//! Sources already at 48 kHz pass through untouched.

use crate::audio::{OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

/// Input frames fed to rubato per process call.
const CHUNK_FRAMES: usize = 1024;

pub struct StreamResampler {
    /// None when the source rate already matches the output rate.
    inner: Option<FastFixedIn<f32>>,
    pending: [Vec<f32>; 2],
    flushed: bool,
}

impl StreamResampler {
    pub fn new(src_rate: u32) -> Result<Self> {
        let inner = if src_rate == OUTPUT_SAMPLE_RATE {
            debug!("source already at {OUTPUT_SAMPLE_RATE} Hz, resampler bypassed");
            None
        } else {
            debug!("resampling {src_rate} Hz -> {OUTPUT_SAMPLE_RATE} Hz");
            Some(
                FastFixedIn::<f32>::new(
                    f64::from(OUTPUT_SAMPLE_RATE) / f64::from(src_rate),
                    1.0,
                    PolynomialDegree::Septic,
                    CHUNK_FRAMES,
                    OUTPUT_CHANNELS,
                )
                .map_err(|e| Error::Decode(format!("failed to create resampler: {e}")))?,
            )
        };

        Ok(Self {
            inner,
            pending: [Vec::new(), Vec::new()],
            flushed: false,
        })
    }

    /// Feed interleaved stereo input, returning whatever full chunks
    /// became available (possibly nothing yet).
    pub fn push(&mut self, interleaved: &[f32]) -> Result<Vec<f32>> {
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(interleaved.to_vec());
        };

        for frame in interleaved.chunks_exact(OUTPUT_CHANNELS) {
            self.pending[0].push(frame[0]);
            self.pending[1].push(frame[1]);
        }

        let mut out = Vec::new();
        while self.pending[0].len() >= CHUNK_FRAMES {
            let chunk = [
                &self.pending[0][..CHUNK_FRAMES],
                &self.pending[1][..CHUNK_FRAMES],
            ];
            let planar = resampler
                .process(&chunk, None)
                .map_err(|e| Error::Decode(format!("resampling failed: {e}")))?;
            interleave_into(&planar, &mut out);
            self.pending[0].drain(..CHUNK_FRAMES);
            self.pending[1].drain(..CHUNK_FRAMES);
        }
        Ok(out)
    }

    /// Drain the backlog and the resampler's internal delay line.
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        if self.flushed {
            return Ok(Vec::new());
        }
        self.flushed = true;

        let Some(resampler) = self.inner.as_mut() else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        if !self.pending[0].is_empty() {
            let chunk = [&self.pending[0][..], &self.pending[1][..]];
            let planar = resampler
                .process_partial(Some(&chunk), None)
                .map_err(|e| Error::Decode(format!("resampler flush failed: {e}")))?;
            interleave_into(&planar, &mut out);
            self.pending[0].clear();
            self.pending[1].clear();
        }

        let planar = resampler
            .process_partial(Option::<&[Vec<f32>]>::None, None)
            .map_err(|e| Error::Decode(format!("resampler flush failed: {e}")))?;
        interleave_into(&planar, &mut out);

        debug!("flushed resampler ({} frames)", out.len() / OUTPUT_CHANNELS);
        Ok(out)
    }
}

fn interleave_into(planar: &[Vec<f32>], out: &mut Vec<f32>) {
    if planar.is_empty() {
        return;
    }
    let frames = planar[0].len();
    out.reserve(frames * OUTPUT_CHANNELS);
    for i in 0..frames {
        out.push(planar[0][i]);
        out.push(planar[1][i]);
    }
}
