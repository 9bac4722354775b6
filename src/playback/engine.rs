//! The playback engine
//!
//! Wires the scheduler, the decode worker and the real-time output
//! callback together around the sample ring:
//!
//! - the **schedule worker** keeps one track pre-loaded ahead of what
//!   is playing, so the strict duration scan and resampler warm-up
//!   never stall a transition;
//! - the **decode worker** extracts gain-corrected periods from the
//!   current track, stitching the next track into the same period at a
//!   boundary, and feeds the ring;
//! - the **output callback** copies periods out of the ring on the
//!   device thread, applying the pause/resume fade and falling back to
//!   silence on underrun. It never blocks and never allocates.
//!
//! One-shot "go" signalling between the workers uses single-slot
//! channels; the only mutex guards the current/next track slots.

use crate::audio::output::AudioOutput;
use crate::audio::OUTPUT_CHANNELS;
use crate::error::{Error, Result};
use crate::playback::fader::StateFader;
use crate::playback::ring::{AudioRing, RingConsumer, RingProducer};
use crate::playback::state::{EngineState, StateCell};
use crate::playback::track::TrackContext;
use crate::playback::{PERIOD_FRAMES, RING_SECONDS};
use crate::schedule::Scheduler;
use crate::status::{StatusHandle, TrackFacts};
use chrono::{DateTime, Duration as ChronoDuration, Local};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How long workers sleep in a wait loop before re-checking state.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// The current/next decode slots, guarded by the file mutex.
#[derive(Default)]
struct Slots {
    current: Option<TrackContext>,
    next: Option<TrackContext>,
}

struct Shared {
    state: StateCell,
    slots: Mutex<Slots>,
    status: Arc<StatusHandle>,
    decoder_go: Sender<()>,
    scheduler_go: Sender<()>,
    space_available: Sender<()>,
    shutdown: Sender<()>,
}

impl Shared {
    /// Cooperative shutdown: flip the state word and wake every waiter.
    fn halt(&self, state: EngineState) {
        self.state.store(state);
        let _ = self.scheduler_go.try_send(());
        let _ = self.decoder_go.try_send(());
        let _ = self.space_available.try_send(());
        let _ = self.shutdown.try_send(());
    }

    /// Publish the slot contents to the status snapshot.
    fn publish_status(&self, slots: &Slots) {
        self.status.publish(
            slots.current.as_ref().map(|c| TrackFacts::from_info(&c.info)),
            slots.next.as_ref().map(|n| TrackFacts::from_info(&n.info)),
        );
    }
}

/// Receivers and the scheduler, consumed when the engine starts.
struct Boot {
    scheduler: Scheduler,
    decoder_go_rx: Receiver<()>,
    scheduler_go_rx: Receiver<()>,
    space_rx: Receiver<()>,
    shutdown_rx: Receiver<()>,
}

pub struct PlaybackEngine {
    shared: Arc<Shared>,
    boot: Mutex<Option<Boot>>,
}

impl PlaybackEngine {
    pub fn new(scheduler: Scheduler, status: Arc<StatusHandle>) -> Self {
        let (decoder_go, decoder_go_rx) = bounded(1);
        let (scheduler_go, scheduler_go_rx) = bounded(1);
        let (space_available, space_rx) = bounded(1);
        let (shutdown, shutdown_rx) = bounded(1);

        Self {
            shared: Arc::new(Shared {
                state: StateCell::new(EngineState::Stopped),
                slots: Mutex::new(Slots::default()),
                status,
                decoder_go,
                scheduler_go,
                space_available,
                shutdown,
            }),
            boot: Mutex::new(Some(Boot {
                scheduler,
                decoder_go_rx,
                scheduler_go_rx,
                space_rx,
                shutdown_rx,
            })),
        }
    }

    pub fn state(&self) -> EngineState {
        self.shared.state.load()
    }

    /// Begin the fade to silence. Ignored outside of playback.
    pub fn pause(&self) {
        let state = &self.shared.state;
        if state.transition(EngineState::Playing, EngineState::Pausing)
            || state.transition(EngineState::Resuming, EngineState::Pausing)
        {
            info!("pausing");
        }
    }

    /// Begin the fade back from silence. Ignored unless paused.
    pub fn resume(&self) {
        let state = &self.shared.state;
        if state.transition(EngineState::Paused, EngineState::Resuming)
            || state.transition(EngineState::Pausing, EngineState::Resuming)
        {
            info!("resuming");
        }
    }

    /// Request a cooperative stop. Safe from any thread, idempotent.
    pub fn stop(&self) {
        if self.shared.state.halted() {
            return;
        }
        info!("stopping");
        self.shared.halt(EngineState::Stopping);
    }

    /// Run playback to completion. Blocking; call from a dedicated
    /// thread. Returns once the engine has stopped, with Err for fatal
    /// failures (output init, scheduler exhaustion).
    pub fn run(&self) -> Result<()> {
        let boot = self
            .boot
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::Playback("engine already started".into()))?;

        if !self
            .shared
            .state
            .transition(EngineState::Stopped, EngineState::Resuming)
        {
            return Err(Error::Playback("player not in stopped state".into()));
        }

        let Boot {
            scheduler,
            decoder_go_rx,
            scheduler_go_rx,
            space_rx,
            shutdown_rx,
        } = boot;

        let (producer, consumer) = AudioRing::with_seconds(RING_SECONDS).split();

        let mut output = match AudioOutput::new() {
            Ok(output) => output,
            Err(e) => {
                self.shared.state.store(EngineState::Error);
                return Err(e);
            }
        };

        let sched_shared = Arc::clone(&self.shared);
        let scheduler_thread = spawn_worker("schedule", move || {
            schedule_worker(sched_shared, scheduler, scheduler_go_rx)
        })?;

        let dec_shared = Arc::clone(&self.shared);
        let decoder_thread = spawn_worker("decode", move || {
            decode_worker(dec_shared, producer, decoder_go_rx, space_rx)
        })?;

        let cb_shared = Arc::clone(&self.shared);
        let mut cons = consumer;
        let mut state_fader = StateFader::new();
        let start_result = output.start(move |data: &mut [f32]| {
            render_period(&cb_shared, &mut cons, &mut state_fader, data)
        });

        if let Err(e) = start_result {
            self.shared.halt(EngineState::Error);
            join_worker(scheduler_thread);
            join_worker(decoder_thread);
            return Err(e);
        }

        // Parked until a signal or a fatal worker failure ends playback.
        let _ = shutdown_rx.recv();

        join_worker(scheduler_thread);
        join_worker(decoder_thread);
        output.stop();

        {
            let mut slots = self.shared.slots.lock().unwrap();
            slots.current = None;
            slots.next = None;
        }

        if self.shared.state.load() == EngineState::Error {
            return Err(Error::Playback("playback aborted on fatal error".into()));
        }
        self.shared.state.store(EngineState::Stopped);
        info!("player stopped");
        Ok(())
    }
}

fn spawn_worker<F>(name: &str, f: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(f)
        .map_err(|e| Error::Playback(format!("failed to spawn {name} thread: {e}")))
}

fn join_worker(handle: JoinHandle<()>) {
    if let Err(e) = handle.join() {
        warn!("worker thread panicked: {e:?}");
    }
}

/// Ask the scheduler for a track and open its decoder chain.
fn load_track(scheduler: &mut Scheduler, at: DateTime<Local>) -> Option<TrackContext> {
    match scheduler.next_for(at) {
        Ok((info, _fade)) => {
            debug!("loading next file: {}", info.path.display());
            match TrackContext::new(info) {
                Ok(ctx) => Some(ctx),
                Err(e) => {
                    error!("failed to initialize decoder: {e}");
                    None
                }
            }
        }
        Err(e) => {
            error!("failed to get next file from scheduler: {e}");
            None
        }
    }
}

/// Schedule worker: keeps `next` loaded one track ahead.
fn schedule_worker(shared: Arc<Shared>, mut scheduler: Scheduler, go_rx: Receiver<()>) {
    debug!("scheduler thread started");

    // First boot: fill both slots before waking the decoder. The
    // second pick is scheduled for when the first will have finished.
    let mut sched_time = Local::now();
    let Some(first) = load_track(&mut scheduler, sched_time) else {
        error!("failed to load initial file");
        shared.halt(EngineState::Error);
        return;
    };

    sched_time += ChronoDuration::seconds(i64::from(first.info.duration_secs));
    {
        let mut slots = shared.slots.lock().unwrap();
        slots.current = Some(first);
    }

    let Some(second) = load_track(&mut scheduler, sched_time) else {
        error!("failed to load second file");
        shared.halt(EngineState::Error);
        return;
    };

    // Captured before the decoder can swap slots; once it does, the
    // pre-loaded "next" becomes the playing track and this duration
    // anchors the pick after it.
    let mut pending_duration = second.info.duration_secs;
    {
        let mut slots = shared.slots.lock().unwrap();
        slots.next = Some(second);
        shared.publish_status(&slots);
    }
    let _ = shared.decoder_go.try_send(());

    while !shared.state.halted() {
        // Wait for the decoder to hand the pre-loaded track on air.
        match go_rx.recv_timeout(WAIT_SLICE) {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if shared.state.halted() {
            break;
        }

        let now = Local::now();
        debug!(
            "scheduler triggered at: {}",
            now.format("%a %d %b %Y, %H:%M:%S")
        );
        sched_time = now + ChronoDuration::seconds(i64::from(pending_duration));

        let Some(next) = load_track(&mut scheduler, sched_time) else {
            error!("failed to load next file");
            shared.halt(EngineState::Error);
            break;
        };
        pending_duration = next.info.duration_secs;

        {
            let mut slots = shared.slots.lock().unwrap();
            slots.next = Some(next);
            shared.publish_status(&slots);
        }
        let _ = shared.decoder_go.try_send(());
    }

    debug!("scheduler thread stopping");
}

/// Decode worker: fills the ring one period at a time, swapping in the
/// pre-loaded next track when the current one runs dry.
fn decode_worker(
    shared: Arc<Shared>,
    mut producer: RingProducer,
    go_rx: Receiver<()>,
    space_rx: Receiver<()>,
) {
    debug!("decoder thread started");

    let period_samples = PERIOD_FRAMES * OUTPUT_CHANNELS;
    let mut period = vec![0.0f32; period_samples];

    // Wait until the schedule worker has something for us.
    loop {
        match go_rx.recv_timeout(WAIT_SLICE) {
            Ok(()) => break,
            Err(RecvTimeoutError::Timeout) => {
                if shared.state.halted() {
                    debug!("decoder thread stopping before first file");
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }

    while !shared.state.halted() {
        if producer.free() < period_samples {
            let _ = space_rx.recv_timeout(WAIT_SLICE);
            continue;
        }

        let filled = fill_period(&shared, &mut period);

        if filled > 0 {
            let written = producer.write(&period[..filled]);
            if written < filled {
                warn!("ring overrun: wrote {written} of {filled} samples");
            }
        } else {
            // Both slots dry (current at EOF, next not loaded yet).
            thread::sleep(Duration::from_millis(1));
        }
    }

    debug!("decoder thread stopping");
}

/// Extract one period under the file mutex, swapping the pre-loaded
/// next track in when the current one runs dry so the period straddles
/// the boundary without a gap. Returns the samples filled.
fn fill_period(shared: &Shared, period: &mut [f32]) -> usize {
    let period_samples = period.len();
    let mut slots = shared.slots.lock().unwrap();

    let mut filled = 0usize;
    if let Some(current) = slots.current.as_mut() {
        filled = current.extract_frames(period, &shared.state);
    }

    // Short period + a loaded next: the current track is spent.
    if filled < period_samples && slots.next.is_some() {
        if let Some(spent) = slots.current.take() {
            let drift = spent.drift();
            if drift.abs() > 100 {
                warn!("inconsistent playback diff: {drift} samples");
            }
        }
        debug!("switching to next file");
        slots.current = slots.next.take();
        shared.status.reset_elapsed();
        shared.publish_status(&slots);
        let _ = shared.scheduler_go.try_send(());

        if let Some(current) = slots.current.as_mut() {
            filled += current.extract_frames(&mut period[filled..], &shared.state);
        }
    }

    filled
}

/// Output callback body, invoked on the device's real-time thread.
fn render_period(
    shared: &Arc<Shared>,
    cons: &mut RingConsumer,
    fader: &mut StateFader,
    data: &mut [f32],
) {
    let state = shared.state.load();
    match state {
        EngineState::Stopping | EngineState::Stopped | EngineState::Error => {
            silence(data);
            return;
        }
        EngineState::Paused => {
            silence(data);
            return;
        }
        EngineState::Pausing => {
            if !fader.is_active() {
                debug!("starting fade out for pause");
                fader.start(false);
            }
        }
        EngineState::Resuming => {
            if !fader.is_active() {
                debug!("starting fade in for resume");
                fader.start(true);
            }
        }
        EngineState::Playing => {}
    }

    let needed = data.len();
    if cons.available() < needed {
        silence(data);
        if state == EngineState::Playing {
            warn!(
                "ring underrun: needed {needed} samples, available {}",
                cons.available()
            );
        }
        return;
    }

    let read = cons.read(data);
    debug_assert_eq!(read, needed);
    let _ = shared.space_available.try_send(());
    shared.status.add_samples(read as u64);

    if fader.is_active() && fader.apply(data) {
        match shared.state.load() {
            EngineState::Pausing => {
                shared.state.store(EngineState::Paused);
                debug!("fade out complete, now paused");
            }
            EngineState::Resuming => {
                shared.state.store(EngineState::Playing);
                debug!("fade in complete, now playing");
            }
            _ => {}
        }
    }
}

fn silence(data: &mut [f32]) {
    data.fill(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_shared() -> (Arc<Shared>, Receiver<()>, Receiver<()>) {
        let (decoder_go, _decoder_go_rx) = bounded(1);
        let (scheduler_go, scheduler_go_rx) = bounded(1);
        let (space_available, space_rx) = bounded(1);
        let (shutdown, _shutdown_rx) = bounded(1);
        (
            Arc::new(Shared {
                state: StateCell::new(EngineState::Playing),
                slots: Mutex::new(Slots::default()),
                status: Arc::new(StatusHandle::new()),
                decoder_go,
                scheduler_go,
                space_available,
                shutdown,
            }),
            scheduler_go_rx,
            space_rx,
        )
    }

    fn ring_with(samples: &[f32]) -> (RingConsumer, usize) {
        let (mut prod, cons) = AudioRing::with_seconds(1).split();
        let written = prod.write(samples);
        (cons, written)
    }

    #[test]
    fn playing_copies_ring_data_and_signals_space() {
        let (shared, _sg, space_rx) = test_shared();
        let input: Vec<f32> = (0..512).map(|i| i as f32 / 512.0).collect();
        let (mut cons, _) = ring_with(&input);
        let mut fader = StateFader::new();

        let mut out = vec![0.0f32; 512];
        render_period(&shared, &mut cons, &mut fader, &mut out);

        assert_eq!(out, input);
        assert!(space_rx.try_recv().is_ok());
        assert_eq!(shared.status.elapsed_secs(), 0); // 512 samples << 1s
    }

    #[test]
    fn underrun_fills_silence() {
        let (shared, _sg, _space) = test_shared();
        let (mut cons, _) = ring_with(&[1.0; 16]);
        let mut fader = StateFader::new();

        let mut out = vec![0.7f32; 64];
        render_period(&shared, &mut cons, &mut fader, &mut out);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn paused_outputs_silence_without_draining() {
        let (shared, _sg, _space) = test_shared();
        shared.state.store(EngineState::Paused);
        let (mut cons, _) = ring_with(&[0.5; 128]);
        let mut fader = StateFader::new();

        let mut out = vec![0.9f32; 64];
        render_period(&shared, &mut cons, &mut fader, &mut out);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(cons.available(), 128);
    }

    #[test]
    fn pausing_fades_and_lands_in_paused() {
        let (shared, _sg, _space) = test_shared();
        shared.state.store(EngineState::Pausing);

        let (mut prod, mut cons) = AudioRing::with_seconds(1).split();
        let chunk = vec![1.0f32; 4800 * 2];
        prod.write(&chunk);
        let mut fader = StateFader::new();

        let mut out = vec![0.0f32; 4800 * 2];
        render_period(&shared, &mut cons, &mut fader, &mut out);
        assert!(fader.is_active());
        // Early in the fade-out the gain is still near unity.
        assert!(out[0] > 0.9);

        // Keep the ring topped up and drive the fade budget through
        // (2 s at 48 kHz = 20 calls of 4800 frames).
        for _ in 0..25 {
            prod.write(&chunk);
            render_period(&shared, &mut cons, &mut fader, &mut out);
            if shared.state.load() == EngineState::Paused {
                break;
            }
        }
        assert_eq!(shared.state.load(), EngineState::Paused);
    }

    #[test]
    fn resuming_completes_to_playing() {
        let (shared, _sg, _space) = test_shared();
        shared.state.store(EngineState::Resuming);

        let (mut prod, mut cons) = AudioRing::with_seconds(1).split();
        let chunk = vec![1.0f32; 4800 * 2];
        prod.write(&chunk);
        let mut fader = StateFader::new();

        let mut out = vec![0.0f32; 4800 * 2];
        render_period(&shared, &mut cons, &mut fader, &mut out);
        // Fade-in starts from silence.
        assert!(out[0].abs() < 1e-6);

        for _ in 0..25 {
            prod.write(&chunk);
            render_period(&shared, &mut cons, &mut fader, &mut out);
            if shared.state.load() == EngineState::Playing {
                break;
            }
        }
        assert_eq!(shared.state.load(), EngineState::Playing);
    }

    #[test]
    fn period_straddles_a_track_boundary() {
        use crate::media::AudioFile;
        use crate::playback::track::TrackContext;
        use crate::testutil::{flat_frames, write_wav};

        let dir = tempfile::tempdir().unwrap();
        let info = |name: &str, amp: i16| {
            let path = dir.path().join(name);
            write_wav(&path, 48_000, &flat_frames(48_000, 1, amp));
            AudioFile {
                path,
                artist: None,
                album: None,
                title: Some(name.to_string()),
                album_id: None,
                release_track_id: None,
                album_gain_db: 0.0,
                album_peak: 0.0,
                track_gain_db: 0.0,
                track_peak: 0.0,
                duration_secs: 1,
                zone_name: "test".into(),
                fade: None,
            }
        };

        let (shared, scheduler_go_rx, _space) = test_shared();
        {
            let mut slots = shared.slots.lock().unwrap();
            slots.current = Some(TrackContext::new(info("a.wav", 8000)).unwrap());
            slots.next = Some(TrackContext::new(info("b.wav", 16000)).unwrap());
        }

        // 1 s at 48 kHz stereo is 96000 samples: 23 whole periods of
        // 4096 plus a remainder, so the 24th period crosses the
        // boundary.
        let mut period = vec![0.0f32; PERIOD_FRAMES * OUTPUT_CHANNELS];
        for _ in 0..23 {
            assert_eq!(fill_period(&shared, &mut period), period.len());
        }

        let filled = fill_period(&shared, &mut period);
        assert_eq!(filled, period.len(), "boundary period must be full");

        // Head of the period is track A, tail is track B.
        let a_level = 8000.0 / 32767.0;
        let b_level = 16000.0 / 32767.0;
        assert!((period[0] - a_level).abs() < 1e-3);
        assert!((period[period.len() - 1] - b_level).abs() < 1e-3);

        // The swap woke the schedule worker and republished status.
        assert!(scheduler_go_rx.try_recv().is_ok());
        let snap = shared.status.snapshot();
        assert_eq!(snap.current.as_ref().unwrap().title, "b.wav");
        assert!(snap.next.is_none());
    }

    #[test]
    fn halt_wakes_the_shutdown_channel() {
        let (decoder_go, _d) = bounded(1);
        let (scheduler_go, _s) = bounded(1);
        let (space_available, _sp) = bounded(1);
        let (shutdown, shutdown_rx) = bounded(1);
        let shared = Shared {
            state: StateCell::new(EngineState::Playing),
            slots: Mutex::new(Slots::default()),
            status: Arc::new(StatusHandle::new()),
            decoder_go,
            scheduler_go,
            space_available,
            shutdown,
        };

        shared.halt(EngineState::Stopping);
        assert_eq!(shared.state.load(), EngineState::Stopping);
        assert!(shutdown_rx.try_recv().is_ok());
    }
}
