//! Structural validation of a parsed week schedule.
//!
//! Enforces the same contract the configuration schema documents:
//! bounded fade parameters, positive burst settings, at most four
//! intermediates per zone, and strictly ordered, disjoint zones per
//! day. Runs before any playlist file is touched.

use super::WeekSchedule;
use crate::error::{Error, Result};
use crate::playlist::FadeInfo;
use chrono::NaiveTime;
use tracing::warn;

const MAX_FADE_SECS: u32 = 10;
const MAX_INTERMEDIATES: usize = 4;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

pub fn validate(week: &WeekSchedule) -> Result<()> {
    for (idx, day) in week.days.iter().enumerate() {
        let day_name = DAY_NAMES[idx];

        if day.zones.is_empty() {
            return Err(Error::Config(format!("empty day schedule ({day_name})")));
        }

        // Strictly ascending start times; equal starts would overlap.
        for pair in day.zones.windows(2) {
            if pair[1].start < pair[0].start {
                return Err(Error::Config(format!(
                    "zones stored in wrong order on {day_name} ({} before {})",
                    pair[0].name, pair[1].name
                )));
            }
            if pair[1].start == pair[0].start {
                return Err(Error::Config(format!(
                    "overlapping zones on {day_name} ({} and {})",
                    pair[0].name, pair[1].name
                )));
            }
        }

        if day.zones.iter().all(|z| z.start != NaiveTime::MIN) {
            warn!("nothing scheduled at 00:00:00 on {day_name}");
        }

        for zone in &day.zones {
            validate_fade(zone.main.fade.as_ref(), &zone.name)?;
            if let Some(fallback) = &zone.fallback {
                validate_fade(fallback.fade.as_ref(), &zone.name)?;
            }

            if zone.others.len() > MAX_INTERMEDIATES {
                return Err(Error::Config(format!(
                    "zone {} has {} intermediate playlists (max {MAX_INTERMEDIATES})",
                    zone.name,
                    zone.others.len()
                )));
            }

            for ipls in &zone.others {
                validate_fade(ipls.base.fade.as_ref(), &ipls.name)?;
                if ipls.interval_minutes == 0 {
                    return Err(Error::Config(format!(
                        "no scheduling interval set for {}",
                        ipls.name
                    )));
                }
                if ipls.items_per_burst == 0 {
                    return Err(Error::Config(format!(
                        "number of items to be scheduled set to 0 for {}",
                        ipls.name
                    )));
                }
            }
        }
    }
    Ok(())
}

fn validate_fade(fade: Option<&FadeInfo>, owner: &str) -> Result<()> {
    let Some(fade) = fade else { return Ok(()) };

    if fade.fadein_secs > MAX_FADE_SECS || fade.fadeout_secs > MAX_FADE_SECS {
        return Err(Error::Config(format!(
            "fade durations for {owner} exceed {MAX_FADE_SECS}s"
        )));
    }
    for (name, level) in [("MinLevel", fade.min_level), ("MaxLevel", fade.max_level)] {
        if !(0.0..=1.0).contains(&level) {
            return Err(Error::Config(format!(
                "{name} for {owner} out of range: {level}"
            )));
        }
    }
    Ok(())
}
