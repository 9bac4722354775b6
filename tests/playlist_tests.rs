//! Playlist parsing and rotation through the public API.

mod common;

use aircast::playlist::Playlist;
use aircast::util::rng::ShuffleRng;
use common::bump_mtime;
use std::io::Write;

#[test]
fn pls_and_m3u_agree_on_the_same_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut media = Vec::new();
    for i in 0..3 {
        let p = dir.path().join(format!("track-{i}.wav"));
        std::fs::File::create(&p).unwrap().write_all(b"x").unwrap();
        media.push(p);
    }

    let m3u = dir.path().join("list.m3u");
    let mut f = std::fs::File::create(&m3u).unwrap();
    writeln!(f, "#EXTM3U").unwrap();
    for m in &media {
        writeln!(f, "{}", m.display()).unwrap();
    }
    drop(f);

    let pls = dir.path().join("list.pls");
    let mut f = std::fs::File::create(&pls).unwrap();
    writeln!(f, "[playlist]").unwrap();
    writeln!(f, "NumberOfEntries=3").unwrap();
    for (i, m) in media.iter().enumerate() {
        writeln!(f, "File{}={}", i + 1, m.display()).unwrap();
    }
    drop(f);

    let mut rng = ShuffleRng::new();
    let mut from_m3u = Playlist::new(m3u, false, None);
    from_m3u.process(&mut rng).unwrap();
    let mut from_pls = Playlist::new(pls, false, None);
    from_pls.process(&mut rng).unwrap();

    assert_eq!(from_m3u.items, from_pls.items);
    assert_eq!(from_m3u.items, media);
}

#[test]
fn rotation_position_survives_a_reload() {
    let dir = tempfile::tempdir().unwrap();
    let mut media = Vec::new();
    for i in 0..4 {
        let p = dir.path().join(format!("track-{i}.wav"));
        std::fs::File::create(&p).unwrap().write_all(b"x").unwrap();
        media.push(p);
    }

    let list = dir.path().join("list.m3u");
    let write_list = |paths: &[std::path::PathBuf]| {
        let mut f = std::fs::File::create(&list).unwrap();
        for p in paths {
            writeln!(f, "{}", p.display()).unwrap();
        }
    };
    write_list(&media[..3]);

    let mut rng = ShuffleRng::new();
    let mut pls = Playlist::new(list.clone(), false, None);
    pls.process(&mut rng).unwrap();
    assert_eq!(pls.next_item(&mut rng).unwrap(), media[0]);
    assert_eq!(pls.cursor, 1);

    // Growing the source file must not restart the rotation: the
    // cursor stays put and the next pick continues from where it was.
    write_list(&media);
    bump_mtime(&list);
    assert_eq!(pls.items.len(), 3);
    assert_eq!(pls.next_item(&mut rng).unwrap(), media[1]);
    assert_eq!(pls.items.len(), 4);
    assert_eq!(pls.cursor, 2);
    assert_eq!(pls.next_item(&mut rng).unwrap(), media[2]);
}

#[test]
fn cursor_is_clamped_when_a_reload_shrinks_the_list() {
    let dir = tempfile::tempdir().unwrap();
    let mut media = Vec::new();
    for i in 0..5 {
        let p = dir.path().join(format!("track-{i}.wav"));
        std::fs::File::create(&p).unwrap().write_all(b"x").unwrap();
        media.push(p);
    }

    let list = dir.path().join("list.m3u");
    let write_list = |paths: &[std::path::PathBuf]| {
        let mut f = std::fs::File::create(&list).unwrap();
        for p in paths {
            writeln!(f, "{}", p.display()).unwrap();
        }
    };
    write_list(&media);

    let mut rng = ShuffleRng::new();
    let mut pls = Playlist::new(list.clone(), false, None);
    pls.process(&mut rng).unwrap();
    for expected in &media[..4] {
        assert_eq!(&pls.next_item(&mut rng).unwrap(), expected);
    }
    assert_eq!(pls.cursor, 4);

    // Shrink to two entries: the stale cursor is clamped and the
    // rotation wraps cleanly instead of scanning past the end.
    write_list(&media[..2]);
    bump_mtime(&list);
    assert_eq!(pls.next_item(&mut rng).unwrap(), media[0]);
    assert_eq!(pls.cursor, 1);
}
