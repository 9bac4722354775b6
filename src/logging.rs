//! Logging initialization
//!
//! Maps the legacy command-line surface (`-d LEVEL`, `-m MASK`) onto a
//! tracing subscriber. The level selects the global maximum; the hex
//! facility mask gates which subsystems emit debug output when the
//! level is 4. `RUST_LOG` still wins when set, so operators can use
//! either interface.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Debug facility bits, one per subsystem.
pub mod facility {
    pub const PLAYER: u32 = 1 << 0;
    pub const SCHED: u32 = 1 << 1;
    pub const CONFIG: u32 = 1 << 2;
    pub const PLAYLIST: u32 = 1 << 3;
    pub const LOADER: u32 = 1 << 4;
    pub const STATUS: u32 = 1 << 5;
    pub const SIGNALS: u32 = 1 << 6;

    /// Default mask: the subsystems an operator usually cares about.
    pub const DEFAULT: u32 = PLAYER | SCHED | STATUS;
}

/// Module targets gated by each facility bit.
const FACILITY_TARGETS: &[(u32, &[&str])] = &[
    (facility::PLAYER, &["aircast::playback", "aircast::audio"]),
    (facility::SCHED, &["aircast::schedule"]),
    (facility::CONFIG, &["aircast::config"]),
    (facility::PLAYLIST, &["aircast::playlist"]),
    (facility::LOADER, &["aircast::media"]),
    (facility::STATUS, &["aircast::status", "aircast::server"]),
    (facility::SIGNALS, &["aircast::signals"]),
];

/// Translate `-d LEVEL` (0..4) to a base filter level.
fn level_directive(level: u8) -> &'static str {
    match level {
        0 => "off",
        1 => "error",
        2 => "warn",
        3 => "info",
        _ => "debug",
    }
}

/// Build the filter string for a level + facility mask.
///
/// At levels below debug the mask is irrelevant. At debug, unmasked
/// facilities are held back at info so the mask keeps its original
/// meaning of "which subsystems may spam me".
pub fn filter_string(level: u8, mask: u32) -> String {
    let base = level_directive(level);
    if level < 4 {
        return format!("aircast={base}");
    }

    let mut directives = vec!["aircast=info".to_string()];
    for (bit, targets) in FACILITY_TARGETS {
        let lvl = if mask & bit != 0 { "debug" } else { "info" };
        for target in *targets {
            directives.push(format!("{target}={lvl}"));
        }
    }
    directives.join(",")
}

/// Initialize the global tracing subscriber.
pub fn init(level: u8, mask: u32) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_string(level, mask)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_levels_ignore_mask() {
        assert_eq!(filter_string(0, 0xff), "aircast=off");
        assert_eq!(filter_string(1, 0), "aircast=error");
        assert_eq!(filter_string(3, 0xff), "aircast=info");
    }

    #[test]
    fn debug_level_gates_by_mask() {
        let s = filter_string(4, facility::SCHED);
        assert!(s.contains("aircast::schedule=debug"));
        assert!(s.contains("aircast::playback=info"));
        assert!(s.contains("aircast::playlist=info"));
    }

    #[test]
    fn debug_level_all_facilities() {
        let s = filter_string(4, 0xffff_ffff);
        assert!(!s.contains("=info,") || s.starts_with("aircast=info"));
        assert!(s.contains("aircast::media=debug"));
        assert!(s.contains("aircast::signals=debug"));
    }
}
