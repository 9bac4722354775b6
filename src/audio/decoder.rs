//! Streaming track decoder
//!
//! Wraps a symphonia demuxer + codec behind one operation: "give me the
//! next block of decoded-and-resampled audio". Blocks come out as
//! interleaved stereo f32 at the output rate; mono input is duplicated
//! to both channels, multi-channel input contributes its front pair.

use crate::audio::resampler::StreamResampler;
use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::IntoSample;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

pub struct TrackDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    resampler: StreamResampler,
    track_id: u32,
    demux_done: bool,
    finished: bool,
}

impl TrackDecoder {
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Decode(format!("failed to open {}: {e}", path.display())))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Decode(format!("failed to probe {}: {e}", path.display())))?;

        let format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode(format!("no audio track in {}", path.display())))?;

        let track_id = track.id;
        let src_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode(format!("sample rate unknown in {}", path.display())))?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("failed to create decoder: {e}")))?;

        debug!("opened {} (source rate {src_rate} Hz)", path.display());

        Ok(Self {
            format,
            decoder,
            resampler: StreamResampler::new(src_rate)?,
            track_id,
            demux_done: false,
            finished: false,
        })
    }

    /// Next block of interleaved stereo output samples.
    ///
    /// Returns Ok(None) once the stream and resampler are drained. A
    /// decode error mid-stream is surfaced; the caller drops the track.
    pub fn next_block(&mut self) -> Result<Option<Vec<f32>>> {
        if self.finished {
            return Ok(None);
        }

        let mut interleaved = Vec::new();
        loop {
            if self.demux_done {
                let out = self.resampler.flush()?;
                self.finished = true;
                debug!("flushed decoder chain");
                return Ok(if out.is_empty() { None } else { Some(out) });
            }

            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.demux_done = true;
                    continue;
                }
                Err(e) => {
                    self.finished = true;
                    return Err(Error::Decode(format!("packet read error: {e}")));
                }
            };

            // Skip non-audio streams in the container.
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(e) => {
                    self.finished = true;
                    return Err(Error::Decode(format!("decode error: {e}")));
                }
            };

            interleaved.clear();
            convert_to_stereo(&decoded, &mut interleaved);

            let out = self.resampler.push(&interleaved)?;
            if !out.is_empty() {
                return Ok(Some(out));
            }
            // Not enough input buffered for a resampler chunk yet.
        }
    }
}

/// Interleave a decoded buffer as stereo f32.
fn convert_to_stereo(decoded: &AudioBufferRef, out: &mut Vec<f32>) {
    macro_rules! interleave {
        ($buf:expr) => {{
            let channels = $buf.spec().channels.count();
            let frames = $buf.frames();
            out.reserve(frames * 2);
            if channels == 1 {
                for i in 0..frames {
                    let s: f32 = $buf.chan(0)[i].into_sample();
                    out.push(s);
                    out.push(s);
                }
            } else {
                for i in 0..frames {
                    let l: f32 = $buf.chan(0)[i].into_sample();
                    let r: f32 = $buf.chan(1)[i].into_sample();
                    out.push(l);
                    out.push(r);
                }
            }
        }};
    }

    match decoded {
        AudioBufferRef::U8(buf) => interleave!(buf),
        AudioBufferRef::U16(buf) => interleave!(buf),
        AudioBufferRef::U24(buf) => interleave!(buf),
        AudioBufferRef::U32(buf) => interleave!(buf),
        AudioBufferRef::S8(buf) => interleave!(buf),
        AudioBufferRef::S16(buf) => interleave!(buf),
        AudioBufferRef::S24(buf) => interleave!(buf),
        AudioBufferRef::S32(buf) => interleave!(buf),
        AudioBufferRef::F32(buf) => interleave!(buf),
        AudioBufferRef::F64(buf) => interleave!(buf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_wav;

    #[test]
    fn decodes_wav_to_expected_frame_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let frames: Vec<(i16, i16)> = (0..48_000)
            .map(|i| {
                let s = ((i as f32 / 48.0).sin() * 8000.0) as i16;
                (s, s)
            })
            .collect();
        write_wav(&path, 48_000, &frames);

        let mut dec = TrackDecoder::open(&path).unwrap();
        let mut total = 0usize;
        while let Some(block) = dec.next_block().unwrap() {
            assert_eq!(block.len() % 2, 0);
            total += block.len() / 2;
        }
        assert_eq!(total, 48_000);
    }

    #[test]
    fn resamples_non_native_rates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone44.wav");
        let frames: Vec<(i16, i16)> = (0..44_100).map(|_| (1000, -1000)).collect();
        write_wav(&path, 44_100, &frames);

        let mut dec = TrackDecoder::open(&path).unwrap();
        let mut total = 0usize;
        while let Some(block) = dec.next_block().unwrap() {
            total += block.len() / 2;
        }
        // One second of audio, within resampler boundary slack.
        assert!((total as i64 - 48_000).unsigned_abs() < 2048, "got {total}");
    }

    #[test]
    fn open_of_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.bin");
        std::fs::write(&path, [0u8; 64]).unwrap();
        assert!(TrackDecoder::open(&path).is_err());
    }
}
