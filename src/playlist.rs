//! Playlist handling
//!
//! Loads `.pls` / `.m3u` files into an ordered list of absolute media
//! paths, serves items through a rotating cursor with optional shuffle,
//! and transparently reloads when the source file's mtime changes.

use crate::error::{Error, Result};
use crate::util::fs;
use rand::RngCore;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Per-playlist fade parameters.
///
/// Either duration may be zero, meaning "no ramp on that side". Schema
/// validation caps durations at 10 seconds and levels to [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct FadeInfo {
    pub fadein_secs: u32,
    pub fadeout_secs: u32,
    pub min_level: f32,
    pub max_level: f32,
}

impl Default for FadeInfo {
    fn default() -> Self {
        Self {
            fadein_secs: 0,
            fadeout_secs: 0,
            min_level: 0.0,
            max_level: 1.0,
        }
    }
}

/// An ordered list of media file paths with a rotating cursor.
#[derive(Debug)]
pub struct Playlist {
    /// Path of the .pls/.m3u source file
    pub path: PathBuf,
    pub items: Vec<PathBuf>,
    pub shuffle: bool,
    pub cursor: usize,
    pub last_mtime: Option<SystemTime>,
    pub fade: Option<FadeInfo>,
}

enum PlaylistKind {
    Pls,
    M3u,
}

impl Playlist {
    pub fn new(path: PathBuf, shuffle: bool, fade: Option<FadeInfo>) -> Self {
        Self {
            path,
            items: Vec::new(),
            shuffle,
            cursor: 0,
            last_mtime: None,
            fade,
        }
    }

    fn kind(&self) -> Result<PlaylistKind> {
        match self.path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pls") => Ok(PlaylistKind::Pls),
            Some(ext) if ext.eq_ignore_ascii_case("m3u") => Ok(PlaylistKind::M3u),
            _ => Err(Error::Playlist {
                path: self.path.clone(),
                reason: "unknown playlist file type".into(),
            }),
        }
    }

    /// Parse the source file and (re)populate `items`.
    ///
    /// Unreadable entries are logged and skipped; an empty result is an
    /// error. Shuffles after loading when enabled. The cursor is left
    /// where it was so the rotation position survives a reload; it only
    /// resets from the wrap check in [`Playlist::next_item`].
    pub fn process(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        let kind = self.kind()?;

        self.last_mtime = fs::mtime(&self.path);
        if self.last_mtime.is_none() {
            return Err(Error::Playlist {
                path: self.path.clone(),
                reason: "cannot stat playlist file".into(),
            });
        }

        let file = std::fs::File::open(&self.path).map_err(|e| Error::Playlist {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        let reader = BufReader::new(file);

        let parsed = match kind {
            PlaylistKind::Pls => parse_pls(&self.path, reader),
            PlaylistKind::M3u => parse_m3u(reader),
        };
        let items = match parsed {
            Ok(items) => items,
            Err(e) => {
                self.items.clear();
                return Err(e);
            }
        };

        if items.is_empty() {
            self.items.clear();
            return Err(Error::Playlist {
                path: self.path.clone(),
                reason: "no readable entries".into(),
            });
        }

        debug!("got {} files from {}", items.len(), self.path.display());
        self.items = items;
        self.cursor = self.cursor.min(self.items.len());

        if self.shuffle {
            self.shuffle_items(rng);
        }
        Ok(())
    }

    /// Re-process the source file when its mtime changed.
    pub fn reload_if_needed(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        let mtime = fs::mtime(&self.path).ok_or_else(|| Error::Playlist {
            path: self.path.clone(),
            reason: "cannot stat playlist file".into(),
        })?;

        if Some(mtime) == self.last_mtime {
            return Ok(());
        }

        info!("mtime changed, reloading {}", self.path.display());
        self.process(rng)
    }

    /// Serve the next readable item, advancing the cursor past it.
    ///
    /// Wraps (and re-shuffles, when enabled) once the rotation is spent.
    /// Fails when no readable file remains in the current pass.
    pub fn next_item(&mut self, rng: &mut dyn RngCore) -> Result<PathBuf> {
        if let Err(e) = self.reload_if_needed(rng) {
            warn!("re-loading playlist {} failed: {}", self.path.display(), e);
            return Err(e);
        }

        if self.cursor + 1 >= self.items.len() {
            self.cursor = 0;
            if self.shuffle {
                debug!("re-shuffling {}", self.path.display());
                self.shuffle_items(rng);
            }
        }

        for idx in self.cursor..self.items.len() {
            let candidate = &self.items[idx];
            if fs::is_readable_file(candidate) {
                self.cursor = idx + 1;
                return Ok(candidate.clone());
            }
            warn!("file unreadable, skipping: {}", candidate.display());
        }

        Err(Error::Playlist {
            path: self.path.clone(),
            reason: "no readable item left in rotation".into(),
        })
    }

    /// Durstenfeld shuffle over `items`. No-op for lists of one.
    pub fn shuffle_items(&mut self, rng: &mut dyn RngCore) {
        let len = self.items.len();
        if len <= 1 {
            return;
        }
        for i in (1..len).rev() {
            let j = (rng.next_u32() as usize) % (i + 1);
            self.items.swap(i, j);
        }
    }
}

fn parse_pls(path: &Path, reader: impl BufRead) -> Result<Vec<PathBuf>> {
    let mut lines = reader.lines();

    // First non-empty line must be the section header.
    let header = loop {
        match lines.next() {
            Some(line) => {
                let line = line?;
                let trimmed = line.trim().to_string();
                if !trimmed.is_empty() {
                    break trimmed;
                }
            }
            None => {
                return Err(Error::Playlist {
                    path: path.to_path_buf(),
                    reason: "empty pls file".into(),
                })
            }
        }
    };
    if header != "[playlist]" {
        return Err(Error::Playlist {
            path: path.to_path_buf(),
            reason: format!("invalid pls header: {header}"),
        });
    }

    let mut items = Vec::new();
    for line in lines {
        let line = line?;
        let line = line.trim();
        if !line.starts_with("File") {
            continue;
        }
        let Some((_, value)) = line.split_once('=') else {
            warn!("pls entry without '=' rejected: {line}");
            continue;
        };
        add_item(value, &mut items);
    }
    Ok(items)
}

fn parse_m3u(reader: impl BufRead) -> Result<Vec<PathBuf>> {
    let mut items = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        add_item(line, &mut items);
    }
    Ok(items)
}

fn add_item(raw: &str, items: &mut Vec<PathBuf>) {
    let path = PathBuf::from(raw.trim());
    if !fs::is_readable_file(&path) {
        warn!("skipping unreadable playlist entry: {}", path.display());
        return;
    }
    debug!("added file: {}", path.display());
    items.push(path);
}
