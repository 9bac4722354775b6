//! Media file loader / integrity checker
//!
//! Opens an audio file with symphonia, extracts the tags the station
//! cares about (artist/album/title, ReplayGain, MusicBrainz IDs) and
//! determines the duration. In strict mode the whole file is decoded to
//! count output frames, because metadata durations cannot be trusted
//! (VBR mp3s especially); the full read also pulls the file into the
//! page cache, so the playback decoder that follows hits warm pages.

use crate::error::{Error, Result};
use crate::playlist::FadeInfo;
use std::path::{Path, PathBuf};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey, Tag};
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Immutable-after-load descriptor of one scheduled media file.
#[derive(Debug, Clone)]
pub struct AudioFile {
    pub path: PathBuf,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub album_id: Option<String>,
    pub release_track_id: Option<String>,
    /// ReplayGain fields; 0.0 means "absent"
    pub album_gain_db: f32,
    pub album_peak: f32,
    pub track_gain_db: f32,
    pub track_peak: f32,
    pub duration_secs: u32,
    pub zone_name: String,
    pub fade: Option<FadeInfo>,
}

/// Tag values extracted from a file, before they land in an AudioFile.
#[derive(Debug, Default)]
struct TagBag {
    artist: Option<String>,
    album: Option<String>,
    title: Option<String>,
    album_id: Option<String>,
    release_track_id: Option<String>,
    album_gain: Option<String>,
    album_peak: Option<String>,
    track_gain: Option<String>,
    track_peak: Option<String>,
}

impl TagBag {
    fn absorb(&mut self, tag: &Tag) {
        let value = || Some(tag.value.to_string());
        match tag.std_key {
            Some(StandardTagKey::Artist) => self.artist = self.artist.take().or_else(value),
            Some(StandardTagKey::Album) => self.album = self.album.take().or_else(value),
            Some(StandardTagKey::TrackTitle) => self.title = self.title.take().or_else(value),
            Some(StandardTagKey::MusicBrainzAlbumId) => {
                self.album_id = self.album_id.take().or_else(value)
            }
            Some(StandardTagKey::MusicBrainzReleaseTrackId) => {
                self.release_track_id = self.release_track_id.take().or_else(value)
            }
            Some(StandardTagKey::ReplayGainAlbumGain) => {
                self.album_gain = self.album_gain.take().or_else(value)
            }
            Some(StandardTagKey::ReplayGainAlbumPeak) => {
                self.album_peak = self.album_peak.take().or_else(value)
            }
            Some(StandardTagKey::ReplayGainTrackGain) => {
                self.track_gain = self.track_gain.take().or_else(value)
            }
            Some(StandardTagKey::ReplayGainTrackPeak) => {
                self.track_peak = self.track_peak.take().or_else(value)
            }
            // Fall back to the raw key for writers that use
            // nonstandard capitalization or the id3 long names.
            _ => match normalize_key(&tag.key).as_str() {
                "ARTIST" => self.artist = self.artist.take().or_else(value),
                "ALBUM" => self.album = self.album.take().or_else(value),
                "TITLE" => self.title = self.title.take().or_else(value),
                "MUSICBRAINZALBUMID" => self.album_id = self.album_id.take().or_else(value),
                "MUSICBRAINZRELEASETRACKID" => {
                    self.release_track_id = self.release_track_id.take().or_else(value)
                }
                "REPLAYGAINALBUMGAIN" => self.album_gain = self.album_gain.take().or_else(value),
                "REPLAYGAINALBUMPEAK" => self.album_peak = self.album_peak.take().or_else(value),
                "REPLAYGAINTRACKGAIN" => self.track_gain = self.track_gain.take().or_else(value),
                "REPLAYGAINTRACKPEAK" => self.track_peak = self.track_peak.take().or_else(value),
                _ => {}
            },
        }
    }
}

/// Uppercase and strip separators, so `REPLAYGAIN_TRACK_GAIN` and
/// `MusicBrainz Album Id` both match their canonical form.
fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Parse a ReplayGain tag value; `*_GAIN` carries a dB float (often
/// suffixed with " dB"), `*_PEAK` a bare linear float.
fn parse_gain_value(raw: &str) -> f32 {
    let trimmed = raw.trim();
    let numeric: &str = trimmed
        .split_whitespace()
        .next()
        .unwrap_or(trimmed);
    match numeric.parse::<f32>() {
        Ok(v) => v,
        Err(_) => {
            warn!("invalid ReplayGain format: {raw}");
            0.0
        }
    }
}

/// Open an audio file and build its descriptor.
///
/// Non-strict mode trusts the demuxer's reported duration when one is
/// present; strict mode (the default for anything that will go on air)
/// decode-scans the whole file and fails on any decode error.
pub fn load(path: &Path, zone_name: &str, fade: Option<FadeInfo>, strict: bool) -> Result<AudioFile> {
    let file = std::fs::File::open(path).map_err(|e| Error::MediaLoad {
        path: path.to_path_buf(),
        reason: format!("open failed: {e}"),
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mut probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::MediaLoad {
            path: path.to_path_buf(),
            reason: format!("probe failed: {e}"),
        })?;

    let mut tags = TagBag::default();
    if let Some(meta) = probed.metadata.get() {
        if let Some(rev) = meta.current() {
            for tag in rev.tags() {
                tags.absorb(tag);
            }
        }
    }
    if let Some(rev) = probed.format.metadata().current() {
        for tag in rev.tags() {
            tags.absorb(tag);
        }
    }

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::MediaLoad {
            path: path.to_path_buf(),
            reason: "no audio track found".into(),
        })?;

    let sample_rate = track.codec_params.sample_rate.ok_or_else(|| Error::MediaLoad {
        path: path.to_path_buf(),
        reason: "sample rate not found".into(),
    })?;

    let reported_secs = track
        .codec_params
        .n_frames
        .map(|frames| frames as f64 / sample_rate as f64);

    let duration_secs = if !strict {
        match reported_secs {
            Some(secs) => secs.round() as u32,
            // No usable metadata duration; fall back to the scan.
            None => scan_duration(path, probed.format, sample_rate, reported_secs)?,
        }
    } else {
        scan_duration(path, probed.format, sample_rate, reported_secs)?
    };

    let info = AudioFile {
        path: path.to_path_buf(),
        artist: tags.artist,
        album: tags.album,
        title: tags.title,
        album_id: tags.album_id,
        release_track_id: tags.release_track_id,
        album_gain_db: tags.album_gain.as_deref().map_or(0.0, parse_gain_value),
        album_peak: tags.album_peak.as_deref().map_or(0.0, parse_gain_value),
        track_gain_db: tags.track_gain.as_deref().map_or(0.0, parse_gain_value),
        track_peak: tags.track_peak.as_deref().map_or(0.0, parse_gain_value),
        duration_secs,
        zone_name: zone_name.to_string(),
        fade,
    };

    debug!(
        "loaded {}: artist={:?} album={:?} title={:?} gain={} peak={} duration={}s",
        info.path.display(),
        info.artist,
        info.album,
        info.title,
        info.track_gain_db,
        info.track_peak,
        info.duration_secs
    );

    Ok(info)
}

/// Decode the whole stream and count output frames.
///
/// Any decode error or a stream with zero audio frames fails the file;
/// a broadcast chain would rather skip a track than glitch on air.
fn scan_duration(
    path: &Path,
    mut format: Box<dyn FormatReader>,
    sample_rate: u32,
    reported_secs: Option<f64>,
) -> Result<u32> {
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::MediaLoad {
            path: path.to_path_buf(),
            reason: "no audio track found".into(),
        })?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::MediaLoad {
            path: path.to_path_buf(),
            reason: format!("cannot create decoder: {e}"),
        })?;

    let mut total_frames: u64 = 0;
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                return Err(Error::MediaLoad {
                    path: path.to_path_buf(),
                    reason: format!("packet read error: {e}"),
                })
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => total_frames += decoded.frames() as u64,
            Err(e) => {
                return Err(Error::MediaLoad {
                    path: path.to_path_buf(),
                    reason: format!("decode error during scan: {e}"),
                })
            }
        }
    }

    if total_frames == 0 {
        return Err(Error::MediaLoad {
            path: path.to_path_buf(),
            reason: "file contains no audio frames".into(),
        });
    }

    let scanned_secs = total_frames as f64 / sample_rate as f64;
    if let Some(reported) = reported_secs {
        if (scanned_secs - reported).abs() > 1.0 {
            warn!(
                "duration mismatch in {}: metadata {:.3}s, decoded {:.3}s",
                path.display(),
                reported,
                scanned_secs
            );
        }
    } else {
        warn!("no duration metadata in {}", path.display());
    }

    Ok(scanned_secs.round() as u32)
}
