//! Engine state machine word
//!
//! A single atomic read by every thread (including the real-time
//! callback) and written by the control surface and the callback
//! itself. Acquire/release is enough; no lock ever guards it.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Stopped = 0,
    Playing = 1,
    /// Fading out before pause
    Pausing = 2,
    Paused = 3,
    /// Fading in from pause (also the start-up state)
    Resuming = 4,
    Stopping = 5,
    /// Terminal: fatal scheduler/decoder failure
    Error = 6,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EngineState::Stopped => "stopped",
            EngineState::Playing => "playing",
            EngineState::Pausing => "pausing",
            EngineState::Paused => "paused",
            EngineState::Resuming => "resuming",
            EngineState::Stopping => "stopping",
            EngineState::Error => "error",
        };
        write!(f, "{name}")
    }
}

impl EngineState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => EngineState::Playing,
            2 => EngineState::Pausing,
            3 => EngineState::Paused,
            4 => EngineState::Resuming,
            5 => EngineState::Stopping,
            6 => EngineState::Error,
            _ => EngineState::Stopped,
        }
    }
}

pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: EngineState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> EngineState {
        EngineState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: EngineState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Compare-and-set; true when the transition was taken.
    pub fn transition(&self, from: EngineState, to: EngineState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// The engine is shutting down or beyond saving.
    pub fn halted(&self) -> bool {
        matches!(
            self.load(),
            EngineState::Stopping | EngineState::Stopped | EngineState::Error
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_cas_semantics() {
        let cell = StateCell::new(EngineState::Stopped);
        assert!(cell.transition(EngineState::Stopped, EngineState::Resuming));
        assert!(!cell.transition(EngineState::Stopped, EngineState::Playing));
        assert_eq!(cell.load(), EngineState::Resuming);

        cell.store(EngineState::Playing);
        assert!(cell.transition(EngineState::Playing, EngineState::Pausing));
        assert!(cell.transition(EngineState::Pausing, EngineState::Paused));
        assert!(cell.transition(EngineState::Paused, EngineState::Resuming));
        assert!(cell.transition(EngineState::Resuming, EngineState::Playing));
    }

    #[test]
    fn halted_matches_terminal_states() {
        let cell = StateCell::new(EngineState::Playing);
        assert!(!cell.halted());
        cell.store(EngineState::Stopping);
        assert!(cell.halted());
        cell.store(EngineState::Error);
        assert!(cell.halted());
    }
}
