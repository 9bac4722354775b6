//! XML traversal for the week schedule.
//!
//! A read-only DOM walk over the document; every helper returns a
//! `Result` and the traversal short-circuits on the first error, so a
//! broken document can never produce a half-built schedule.

use super::{DaySchedule, IntermediatePlaylist, WeekSchedule, Zone, BURST_IDLE};
use crate::error::{Error, Result};
use crate::playlist::{FadeInfo, Playlist};
use chrono::{DateTime, Local, NaiveTime};
use roxmltree::{Document, Node};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Day element names in `struct tm` order: Sunday = 0.
const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Parse the document into a week schedule.
///
/// `now` seeds the intermediate playlists' burst clocks, so the first
/// burst of each list can fire as soon as the engine starts.
pub fn parse_week(text: &str, now: DateTime<Local>) -> Result<WeekSchedule> {
    let doc = Document::parse(text).map_err(|e| Error::Config(format!("XML parse error: {e}")))?;

    let root = doc.root_element();
    if root.tag_name().name() != "WeekSchedule" {
        return Err(Error::Config(format!(
            "root element is not a WeekSchedule (got {})",
            root.tag_name().name()
        )));
    }

    let mut days: [Option<DaySchedule>; 7] = Default::default();
    for child in root.children().filter(Node::is_element) {
        let name = child.tag_name().name();
        match DAY_NAMES.iter().position(|d| *d == name) {
            Some(idx) => {
                if days[idx].is_some() {
                    return Err(Error::Config(format!("duplicate day element {name}")));
                }
                days[idx] = Some(parse_day(child, now)?);
            }
            None => warn!("ignoring unexpected element {name} in WeekSchedule"),
        }
    }

    let mut out = Vec::with_capacity(7);
    for (idx, day) in days.into_iter().enumerate() {
        match day {
            Some(d) => out.push(d),
            None => {
                return Err(Error::Config(format!(
                    "incomplete week schedule: missing {}",
                    DAY_NAMES[idx]
                )))
            }
        }
    }

    debug!("got week schedule");
    Ok(WeekSchedule {
        days: out
            .try_into()
            .unwrap_or_else(|_| unreachable!("seven days collected above")),
    })
}

fn parse_day(node: Node, now: DateTime<Local>) -> Result<DaySchedule> {
    let mut zones = Vec::new();
    for child in node.children().filter(Node::is_element) {
        if child.tag_name().name() != "Zone" {
            continue;
        }
        zones.push(parse_zone(child, now)?);
    }

    if zones.is_empty() {
        return Err(Error::Config(format!(
            "empty day schedule ({})",
            node.tag_name().name()
        )));
    }

    debug!(
        "got day schedule for {}, zones: {}",
        node.tag_name().name(),
        zones.len()
    );
    Ok(DaySchedule { zones })
}

fn parse_zone(node: Node, now: DateTime<Local>) -> Result<Zone> {
    let name = required_attr(node, "Name")?;
    let start_text = required_attr(node, "Start")?;
    let start = NaiveTime::parse_from_str(&start_text, "%H:%M:%S").map_err(|e| {
        Error::Config(format!("zone {name}: bad start time {start_text:?}: {e}"))
    })?;

    let mut maintainer = None;
    let mut description = None;
    let mut comment = None;
    let mut main = None;
    let mut fallback = None;
    let mut others = Vec::new();

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "Maintainer" => maintainer = Some(text_of(child)?),
            "Description" => description = Some(text_of(child)?),
            "Comment" => comment = Some(text_of(child)?),
            "Main" => main = Some(parse_playlist(child)?),
            "Fallback" => fallback = Some(parse_playlist(child)?),
            "Intermediate" => others.push(parse_intermediate(child, now)?),
            other => warn!("zone {name}: ignoring unexpected element {other}"),
        }
    }

    let main = main.ok_or_else(|| Error::Config(format!("zone {name} has no Main playlist")))?;

    debug!("got zone: {name} @ {start}");
    Ok(Zone {
        name,
        start,
        maintainer,
        description,
        comment,
        main,
        fallback,
        others,
    })
}

fn parse_playlist(node: Node) -> Result<Playlist> {
    let mut path = None;
    let mut shuffle = false;
    let mut fade = None;

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "Path" => path = Some(PathBuf::from(text_of(child)?)),
            "Shuffle" => shuffle = bool_of(child)?,
            "Fader" => fade = parse_fader(child)?,
            other => warn!("playlist: ignoring unexpected element {other}"),
        }
    }

    let path =
        path.ok_or_else(|| Error::Config("playlist element is missing a Path".to_string()))?;

    debug!(
        "got playlist: {} (shuffle: {shuffle}, fader: {})",
        path.display(),
        fade.is_some()
    );
    Ok(Playlist::new(path, shuffle, fade))
}

fn parse_intermediate(node: Node, now: DateTime<Local>) -> Result<IntermediatePlaylist> {
    let name = required_attr(node, "Name")?;

    let mut path = None;
    let mut shuffle = false;
    let mut fade = None;
    let mut interval_minutes = None;
    let mut items_per_burst = None;

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "Path" => path = Some(PathBuf::from(text_of(child)?)),
            "Shuffle" => shuffle = bool_of(child)?,
            "Fader" => fade = parse_fader(child)?,
            "SchedIntervalMins" => interval_minutes = Some(int_of(child)?),
            "NumSchedItems" => items_per_burst = Some(int_of(child)?),
            other => warn!("intermediate {name}: ignoring unexpected element {other}"),
        }
    }

    let path = path.ok_or_else(|| Error::Config(format!("intermediate {name} missing Path")))?;
    let interval_minutes = interval_minutes
        .ok_or_else(|| Error::Config(format!("no scheduling interval set for {name}")))?;
    let items_per_burst = items_per_burst
        .ok_or_else(|| Error::Config(format!("number of items to schedule missing for {name}")))?;

    debug!(
        "got intermediate playlist {name}: every {interval_minutes}m, {items_per_burst} items"
    );
    // Seed the burst clock with the load time and arm the first burst,
    // so a freshly started engine leads with its station IDs.
    Ok(IntermediatePlaylist {
        base: Playlist::new(path, shuffle, fade),
        name,
        interval_minutes,
        items_per_burst,
        last_scheduled: now,
        pending_burst: items_per_burst.min(i32::MAX as u32) as i32,
    })
}

/// Parse a Fader element.
///
/// A fader with both durations at zero carries no information; it is
/// dropped with a warning rather than failing the config.
fn parse_fader(node: Node) -> Result<Option<FadeInfo>> {
    let mut fade = FadeInfo::default();

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "FadeInDurationSecs" => fade.fadein_secs = int_of(child)?,
            "FadeOutDurationSecs" => fade.fadeout_secs = int_of(child)?,
            "MinLevel" => fade.min_level = float_of(child)?,
            "MaxLevel" => fade.max_level = float_of(child)?,
            other => warn!("fader: ignoring unexpected element {other}"),
        }
    }

    if fade.fadein_secs == 0 && fade.fadeout_secs == 0 {
        warn!("got empty fader element");
        return Ok(None);
    }

    debug!(
        "got fader: in {}s out {}s levels {}..{}",
        fade.fadein_secs, fade.fadeout_secs, fade.min_level, fade.max_level
    );
    Ok(Some(fade))
}

fn required_attr(node: Node, attr: &str) -> Result<String> {
    node.attribute(attr)
        .map(|v| v.trim().to_string())
        .ok_or_else(|| {
            Error::Config(format!(
                "{} element is missing the {attr} attribute",
                node.tag_name().name()
            ))
        })
}

fn text_of(node: Node) -> Result<String> {
    let text = node.text().unwrap_or("").trim().to_string();
    if text.is_empty() {
        return Err(Error::Config(format!(
            "empty {} element",
            node.tag_name().name()
        )));
    }
    Ok(text)
}

fn bool_of(node: Node) -> Result<bool> {
    Ok(text_of(node)? == "true")
}

fn int_of(node: Node) -> Result<u32> {
    let text = text_of(node)?;
    text.parse().map_err(|e| {
        Error::Config(format!(
            "bad integer in {}: {text:?} ({e})",
            node.tag_name().name()
        ))
    })
}

fn float_of(node: Node) -> Result<f32> {
    let text = text_of(node)?;
    text.parse().map_err(|e| {
        Error::Config(format!(
            "bad float in {}: {text:?} ({e})",
            node.tag_name().name()
        ))
    })
}
