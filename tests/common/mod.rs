//! Shared fixture helpers for the integration suites.
#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write a minimal 16-bit PCM stereo WAV file.
pub fn write_wav(path: &Path, sample_rate: u32, frames: &[(i16, i16)]) {
    let data_len = (frames.len() * 4) as u32;
    let mut f = std::fs::File::create(path).unwrap();
    f.write_all(b"RIFF").unwrap();
    f.write_all(&(36 + data_len).to_le_bytes()).unwrap();
    f.write_all(b"WAVEfmt ").unwrap();
    f.write_all(&16u32.to_le_bytes()).unwrap();
    f.write_all(&1u16.to_le_bytes()).unwrap();
    f.write_all(&2u16.to_le_bytes()).unwrap();
    f.write_all(&sample_rate.to_le_bytes()).unwrap();
    f.write_all(&(sample_rate * 4).to_le_bytes()).unwrap();
    f.write_all(&4u16.to_le_bytes()).unwrap();
    f.write_all(&16u16.to_le_bytes()).unwrap();
    f.write_all(b"data").unwrap();
    f.write_all(&data_len.to_le_bytes()).unwrap();
    for (l, r) in frames {
        f.write_all(&l.to_le_bytes()).unwrap();
        f.write_all(&r.to_le_bytes()).unwrap();
    }
}

/// Create `count` two-second WAV tracks and an .m3u listing them.
pub fn wav_playlist(dir: &TempDir, name: &str, count: usize) -> (PathBuf, Vec<PathBuf>) {
    let frames: Vec<(i16, i16)> = (0..48_000 * 2).map(|_| (4000, 4000)).collect();
    let mut media = Vec::new();
    let list = dir.path().join(format!("{name}.m3u"));
    let mut f = std::fs::File::create(&list).unwrap();
    for i in 0..count {
        let track = dir.path().join(format!("{name}-{i}.wav"));
        write_wav(&track, 48_000, &frames);
        writeln!(f, "{}", track.display()).unwrap();
        media.push(track);
    }
    (list, media)
}

/// A full-week schedule with one all-day zone per day.
pub fn single_zone_config(dir: &TempDir, main: &Path, extra: &str) -> PathBuf {
    let zone = format!(
        r#"<Zone Name="allday" Start="00:00:00">
             <Main><Path>{}</Path><Shuffle>false</Shuffle></Main>
             {extra}
           </Zone>"#,
        main.display()
    );
    let days: String = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
        .iter()
        .map(|d| format!("<{d}>{zone}</{d}>"))
        .collect();
    let path = dir.path().join("schedule.xml");
    std::fs::write(&path, format!("<WeekSchedule>{days}</WeekSchedule>")).unwrap();
    path
}

/// Push a file's mtime into the future so reload checks trip.
pub fn bump_mtime(path: &Path) {
    let future = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
    let f = std::fs::File::options().append(true).open(path).unwrap();
    f.set_modified(future).unwrap();
}
