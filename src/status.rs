//! Now-playing snapshot
//!
//! A read-mostly copy of (current, next, elapsed) for the status
//! endpoint. The decode worker swaps in a fresh immutable snapshot at
//! every track switch; the output callback only bumps the elapsed
//! sample counter. Readers never block the audio path.

use crate::audio::{OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::media::AudioFile;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The facts about one track the endpoint reports.
#[derive(Debug, Clone, Default)]
pub struct TrackFacts {
    pub artist: String,
    pub album: String,
    pub title: String,
    pub path: String,
    pub duration_secs: u32,
    pub zone: String,
    pub album_id: String,
    pub release_track_id: String,
}

impl TrackFacts {
    pub fn from_info(info: &AudioFile) -> Self {
        Self {
            artist: info.artist.clone().unwrap_or_default(),
            album: info.album.clone().unwrap_or_default(),
            title: info.title.clone().unwrap_or_default(),
            path: info.path.display().to_string(),
            duration_secs: info.duration_secs,
            zone: info.zone_name.clone(),
            album_id: info.album_id.clone().unwrap_or_default(),
            release_track_id: info.release_track_id.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub current: Option<TrackFacts>,
    pub next: Option<TrackFacts>,
}

/// Shared handle between the engine (writer) and the endpoint (reader).
pub struct StatusHandle {
    snapshot: ArcSwap<Snapshot>,
    /// Interleaved samples of the current track that left the ring.
    elapsed_samples: AtomicU64,
}

impl StatusHandle {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
            elapsed_samples: AtomicU64::new(0),
        }
    }

    /// Install a fresh snapshot (decode worker, at track switch; and
    /// schedule worker, when a new "next" lands).
    pub fn publish(&self, current: Option<TrackFacts>, next: Option<TrackFacts>) {
        self.snapshot.store(Arc::new(Snapshot { current, next }));
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    /// Called from the output callback after reading from the ring.
    pub fn add_samples(&self, samples: u64) {
        self.elapsed_samples.fetch_add(samples, Ordering::Relaxed);
    }

    /// Zeroed at track switch by the decode worker.
    pub fn reset_elapsed(&self) {
        self.elapsed_samples.store(0, Ordering::Relaxed);
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_samples.load(Ordering::Relaxed)
            / (u64::from(OUTPUT_SAMPLE_RATE) * OUTPUT_CHANNELS as u64)
    }
}

impl Default for StatusHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_counts_interleaved_samples() {
        let handle = StatusHandle::new();
        assert_eq!(handle.elapsed_secs(), 0);

        // 3 seconds of stereo at 48 kHz.
        handle.add_samples(3 * 48_000 * 2);
        assert_eq!(handle.elapsed_secs(), 3);

        handle.reset_elapsed();
        assert_eq!(handle.elapsed_secs(), 0);
    }

    #[test]
    fn publish_swaps_the_whole_snapshot() {
        let handle = StatusHandle::new();
        assert!(handle.snapshot().current.is_none());

        let facts = TrackFacts {
            title: "Song".into(),
            ..Default::default()
        };
        handle.publish(Some(facts), None);
        let snap = handle.snapshot();
        assert_eq!(snap.current.as_ref().unwrap().title, "Song");
        assert!(snap.next.is_none());
    }
}
