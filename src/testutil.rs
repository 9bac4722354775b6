//! Fixture helpers for unit tests.

use std::io::Write;
use std::path::Path;

/// Write a minimal 16-bit PCM stereo WAV file.
pub fn write_wav(path: &Path, sample_rate: u32, frames: &[(i16, i16)]) {
    let data_len = (frames.len() * 4) as u32;
    let mut f = std::fs::File::create(path).unwrap();
    f.write_all(b"RIFF").unwrap();
    f.write_all(&(36 + data_len).to_le_bytes()).unwrap();
    f.write_all(b"WAVEfmt ").unwrap();
    f.write_all(&16u32.to_le_bytes()).unwrap();
    f.write_all(&1u16.to_le_bytes()).unwrap(); // PCM
    f.write_all(&2u16.to_le_bytes()).unwrap(); // stereo
    f.write_all(&sample_rate.to_le_bytes()).unwrap();
    f.write_all(&(sample_rate * 4).to_le_bytes()).unwrap();
    f.write_all(&4u16.to_le_bytes()).unwrap(); // block align
    f.write_all(&16u16.to_le_bytes()).unwrap();
    f.write_all(b"data").unwrap();
    f.write_all(&data_len.to_le_bytes()).unwrap();
    for (l, r) in frames {
        f.write_all(&l.to_le_bytes()).unwrap();
        f.write_all(&r.to_le_bytes()).unwrap();
    }
}

/// A constant-amplitude stereo signal of `secs` seconds.
pub fn flat_frames(sample_rate: u32, secs: u32, amplitude: i16) -> Vec<(i16, i16)> {
    (0..sample_rate * secs)
        .map(|_| (amplitude, amplitude))
        .collect()
}
