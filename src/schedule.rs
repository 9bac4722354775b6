//! Schedule selection
//!
//! Pure time-driven selection: given a wall-clock instant, pick the
//! zone for that weekday, let any intermediate playlist that is due
//! interrupt with its burst, otherwise rotate the zone's main playlist,
//! falling back when a level comes up empty. Failing to reload a config
//! or playlist is never fatal here; only "nothing to play at all" is.

use crate::config::{ConfigStore, IntermediatePlaylist, BURST_IDLE};
use crate::error::{Error, Result};
use crate::media::{self, AudioFile};
use crate::playlist::{FadeInfo, Playlist};
use crate::util::rng::ShuffleRng;
use chrono::{DateTime, Datelike, Duration, Local};
use rand::RngCore;
use std::path::Path;
use tracing::{debug, info, warn};

/// Media loading hook; production uses [`media::load`], tests stub it.
pub type LoaderFn = fn(&Path, &str, Option<FadeInfo>, bool) -> Result<AudioFile>;

impl IntermediatePlaylist {
    /// Due when a burst is in flight, or the interval has elapsed since
    /// the previous burst completed.
    fn is_ready(&self, now: DateTime<Local>) -> bool {
        if self.pending_burst != BURST_IDLE {
            return true;
        }
        let ready_time = self.last_scheduled + Duration::minutes(i64::from(self.interval_minutes));
        if now > ready_time {
            debug!("intermediate playlist ready: {}", self.name);
            return true;
        }
        false
    }
}

/// Time-of-day program selector over the weekly schedule.
pub struct Scheduler {
    store: ConfigStore,
    rng: ShuffleRng,
    loader: LoaderFn,
}

impl Scheduler {
    /// Load the schedule at `config_path`. Fatal when the initial load
    /// fails; after that the config only reloads opportunistically.
    pub fn new(config_path: &Path) -> Result<Self> {
        let mut rng = ShuffleRng::new();
        let store = ConfigStore::load(config_path, &mut rng)?;
        Ok(Self {
            store,
            rng,
            loader: media::load,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_parts(store: ConfigStore, loader: LoaderFn) -> Self {
        Self {
            store,
            rng: ShuffleRng::new(),
            loader,
        }
    }

    /// Select and load the track that should go on air at `now`.
    pub fn next_for(&mut self, now: DateTime<Local>) -> Result<(AudioFile, Option<FadeInfo>)> {
        info!(
            "scheduling item for: {}",
            now.format("%a %d %b %Y, %H:%M:%S")
        );

        if let Err(e) = self.store.reload_if_needed(&mut self.rng) {
            warn!("re-loading config failed: {e}");
        }

        let day_idx = now.weekday().num_days_from_sunday() as usize;
        let day = &mut self.store.week.days[day_idx];

        // Zones are stored ascending; the reverse scan finds the
        // latest-starting zone at or before the current time of day.
        let tod = now.time();
        let zone_idx = match day.zones.iter().rposition(|z| z.start <= tod) {
            Some(idx) => idx,
            None => {
                warn!("nothing is scheduled for now, using first zone of the day");
                0
            }
        };
        let zone = &mut day.zones[zone_idx];
        let zone_name = zone.name.clone();

        // Intermediate playlists are declared highest priority first.
        let mut chosen = None;
        for (idx, ipls) in zone.others.iter_mut().enumerate() {
            if !ipls.is_ready(now) {
                continue;
            }
            if ipls.pending_burst == BURST_IDLE {
                ipls.pending_burst = ipls.items_per_burst as i32;
            } else if ipls.pending_burst == 0 {
                // Burst complete: stamp the interval clock and let a
                // lower-priority list have its turn.
                ipls.pending_burst = BURST_IDLE;
                ipls.last_scheduled = now;
                continue;
            }
            debug!("pending items for {}: {}", ipls.name, ipls.pending_burst);
            ipls.pending_burst -= 1;
            chosen = Some(idx);
            break;
        }

        if let Some(idx) = chosen {
            let ipls = &mut zone.others[idx];
            match take_from(&mut ipls.base, &zone_name, &mut self.rng, self.loader) {
                Ok(item) => {
                    debug!("using intermediate playlist {}", ipls.name);
                    return Ok(item);
                }
                Err(e) => warn!("intermediate playlist {} failed: {e}", ipls.name),
            }
        }

        match take_from(&mut zone.main, &zone_name, &mut self.rng, self.loader) {
            Ok(item) => {
                debug!("using main playlist");
                return Ok(item);
            }
            Err(e) => warn!("main playlist failed: {e}"),
        }

        if let Some(fallback) = zone.fallback.as_mut() {
            match take_from(fallback, &zone_name, &mut self.rng, self.loader) {
                Ok(item) => {
                    warn!("using fallback playlist");
                    return Ok(item);
                }
                Err(e) => warn!("fallback playlist failed: {e}"),
            }
        }

        Err(Error::SchedulerEmpty)
    }
}

/// Serve the next loadable item from one playlist.
///
/// Loader failures skip the file and keep scanning, bounded to one full
/// rotation so a playlist of broken files cannot spin forever.
fn take_from(
    pls: &mut Playlist,
    zone_name: &str,
    rng: &mut dyn RngCore,
    loader: LoaderFn,
) -> Result<(AudioFile, Option<FadeInfo>)> {
    let attempts = pls.items.len().max(1);
    for _ in 0..attempts {
        let path = pls.next_item(rng)?;
        match loader(&path, zone_name, pls.fade.clone(), true) {
            Ok(info) => {
                info!(
                    "got next item: {} (fader: {})",
                    path.display(),
                    pls.fade.is_some()
                );
                return Ok((info, pls.fade.clone()));
            }
            Err(e) => {
                warn!("skipping {}: {e}", path.display());
            }
        }
    }
    Err(Error::Playlist {
        path: pls.path.clone(),
        reason: "no loadable item".into(),
    })
}
