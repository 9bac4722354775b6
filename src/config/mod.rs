//! Weekly schedule configuration
//!
//! The schedule is an XML document (root `WeekSchedule`, one child per
//! weekday, each holding time-ordered `Zone` elements). This module owns
//! the parsed model and the mtime-triggered reload: a failed reload
//! keeps the previous schedule in use.

mod parse;
mod validate;

use crate::error::{Error, Result};
use crate::playlist::Playlist;
use crate::util::fs;
use chrono::{DateTime, Local, NaiveTime};
use rand::RngCore;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::info;

/// Marks an intermediate playlist with no burst in flight.
pub const BURST_IDLE: i32 = -1;

/// A secondary playlist that periodically interrupts the zone rotation
/// to emit a bounded burst of items (station IDs, jingles).
#[derive(Debug)]
pub struct IntermediatePlaylist {
    pub base: Playlist,
    pub name: String,
    pub interval_minutes: u32,
    pub items_per_burst: u32,
    /// Completion time of the last burst; seeded with the load time.
    pub last_scheduled: DateTime<Local>,
    /// Items still owed in the running burst; `BURST_IDLE` between bursts.
    pub pending_burst: i32,
}

/// A contiguous time-of-day segment bound to one main playlist plus
/// optional fallback and intermediate lists (descending priority).
#[derive(Debug)]
pub struct Zone {
    pub name: String,
    pub start: NaiveTime,
    pub maintainer: Option<String>,
    pub description: Option<String>,
    pub comment: Option<String>,
    pub main: Playlist,
    pub fallback: Option<Playlist>,
    pub others: Vec<IntermediatePlaylist>,
}

/// Zones of one weekday, strictly ascending by start time.
#[derive(Debug, Default)]
pub struct DaySchedule {
    pub zones: Vec<Zone>,
}

/// Seven day schedules, indexed Sunday = 0 .. Saturday = 6.
#[derive(Debug)]
pub struct WeekSchedule {
    pub days: [DaySchedule; 7],
}

impl WeekSchedule {
    /// Load every playlist file referenced by the schedule.
    ///
    /// Runs after validation so a structurally broken document never
    /// touches the filesystem. An empty or malformed playlist fails the
    /// whole config, matching the "reject at the boundary" policy.
    fn process_playlists(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        for day in self.days.iter_mut() {
            for zone in day.zones.iter_mut() {
                zone.main.process(rng)?;
                if let Some(fallback) = zone.fallback.as_mut() {
                    fallback.process(rng)?;
                }
                for ipls in zone.others.iter_mut() {
                    ipls.base.process(rng)?;
                }
            }
        }
        Ok(())
    }
}

/// The parsed schedule plus what is needed to reload it.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    last_mtime: Option<SystemTime>,
    pub week: WeekSchedule,
}

impl ConfigStore {
    /// Parse, validate and fully load the schedule at `path`.
    pub fn load(path: &Path, rng: &mut dyn RngCore) -> Result<Self> {
        let last_mtime = fs::mtime(path);
        if last_mtime.is_none() {
            return Err(Error::Config(format!(
                "cannot stat config file {}",
                path.display()
            )));
        }

        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;

        let mut week = parse::parse_week(&text, Local::now())?;
        validate::validate(&week)?;
        week.process_playlists(rng)?;

        info!("loaded week schedule from {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            last_mtime,
            week,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload when the file's mtime changed.
    ///
    /// Returns Ok(true) when a new schedule was installed. Any failure
    /// leaves the previous schedule in place and surfaces as
    /// `ConfigReload` so the caller can warn and carry on.
    pub fn reload_if_needed(&mut self, rng: &mut dyn RngCore) -> Result<bool> {
        let mtime = fs::mtime(&self.path).ok_or_else(|| Error::ConfigReload {
            path: self.path.clone(),
            reason: "cannot stat config file".into(),
        })?;

        if Some(mtime) == self.last_mtime {
            return Ok(false);
        }

        info!("mtime changed, reloading {}", self.path.display());
        match Self::load(&self.path, rng) {
            Ok(fresh) => {
                *self = fresh;
                Ok(true)
            }
            Err(e) => {
                // Remember the rejected revision so we do not re-parse it
                // on every scheduling decision.
                self.last_mtime = Some(mtime);
                Err(Error::ConfigReload {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }
}
