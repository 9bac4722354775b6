//! Config loading, validation and reload behavior.

mod common;

use aircast::config::ConfigStore;
use aircast::util::rng::ShuffleRng;
use common::{bump_mtime, single_zone_config, wav_playlist};

#[test]
fn load_builds_a_full_week() {
    let dir = tempfile::tempdir().unwrap();
    let (main, media) = wav_playlist(&dir, "main", 3);
    let config = single_zone_config(&dir, &main, "");

    let mut rng = ShuffleRng::new();
    let store = ConfigStore::load(&config, &mut rng).unwrap();

    for day in &store.week.days {
        assert_eq!(day.zones.len(), 1);
        let zone = &day.zones[0];
        assert_eq!(zone.name, "allday");
        assert_eq!(zone.main.items.len(), media.len());
        assert!(zone.fallback.is_none());
    }
}

#[test]
fn empty_playlist_fails_the_config() {
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("empty.m3u");
    std::fs::write(&list, "# no entries\n").unwrap();
    let config = single_zone_config(&dir, &list, "");

    let mut rng = ShuffleRng::new();
    assert!(ConfigStore::load(&config, &mut rng).is_err());
}

#[test]
fn unordered_zones_fail_the_config() {
    let dir = tempfile::tempdir().unwrap();
    let (main, _) = wav_playlist(&dir, "main", 1);

    let zones = format!(
        r#"<Zone Name="late" Start="18:00:00">
             <Main><Path>{main}</Path></Main></Zone>
           <Zone Name="early" Start="06:00:00">
             <Main><Path>{main}</Path></Main></Zone>"#,
        main = main.display()
    );
    let days: String = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
        .iter()
        .map(|d| format!("<{d}>{zones}</{d}>"))
        .collect();
    let config = dir.path().join("schedule.xml");
    std::fs::write(&config, format!("<WeekSchedule>{days}</WeekSchedule>")).unwrap();

    let mut rng = ShuffleRng::new();
    assert!(ConfigStore::load(&config, &mut rng).is_err());
}

#[test]
fn reload_installs_a_new_valid_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let (main, _) = wav_playlist(&dir, "main", 2);
    let config = single_zone_config(&dir, &main, "");

    let mut rng = ShuffleRng::new();
    let mut store = ConfigStore::load(&config, &mut rng).unwrap();
    assert_eq!(store.week.days[0].zones[0].main.items.len(), 2);

    // Same mtime: nothing happens.
    assert!(!store.reload_if_needed(&mut rng).unwrap());

    // Replace with a bigger playlist and bump the mtime.
    let (main2, _) = wav_playlist(&dir, "other", 4);
    single_zone_config(&dir, &main2, "");
    bump_mtime(&config);

    assert!(store.reload_if_needed(&mut rng).unwrap());
    assert_eq!(store.week.days[0].zones[0].main.items.len(), 4);
}

#[test]
fn failed_reload_keeps_the_previous_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let (main, _) = wav_playlist(&dir, "main", 2);
    let config = single_zone_config(&dir, &main, "");

    let mut rng = ShuffleRng::new();
    let mut store = ConfigStore::load(&config, &mut rng).unwrap();

    std::fs::write(&config, "<WeekSchedule><Mon></Mon></WeekSchedule>").unwrap();
    bump_mtime(&config);

    assert!(store.reload_if_needed(&mut rng).is_err());
    // Previous schedule still in use.
    assert_eq!(store.week.days[0].zones[0].main.items.len(), 2);

    // The broken revision is not re-parsed on the next check.
    assert!(!store.reload_if_needed(&mut rng).unwrap());
}
