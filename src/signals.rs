//! Process signal dispatch
//!
//! Termination signals stop the engine; the user signals drive
//! pause/resume, so an operator can mute the stream without dropping
//! the schedule. Synchronous crash signals keep their default
//! delivery. The runtime's signal driver replaces the dedicated
//! signal-reading thread a bare-metal implementation would need.

use crate::error::{Error, Result};
use crate::playback::engine::PlaybackEngine;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

/// Listen for control signals until a termination signal arrives.
pub async fn dispatch(engine: Arc<PlaybackEngine>) -> Result<()> {
    let mut term = signal(SignalKind::terminate())
        .map_err(|e| Error::Playback(format!("cannot install SIGTERM handler: {e}")))?;
    let mut int = signal(SignalKind::interrupt())
        .map_err(|e| Error::Playback(format!("cannot install SIGINT handler: {e}")))?;
    let mut usr1 = signal(SignalKind::user_defined1())
        .map_err(|e| Error::Playback(format!("cannot install SIGUSR1 handler: {e}")))?;
    let mut usr2 = signal(SignalKind::user_defined2())
        .map_err(|e| Error::Playback(format!("cannot install SIGUSR2 handler: {e}")))?;

    loop {
        tokio::select! {
            _ = term.recv() => {
                info!("received SIGTERM");
                engine.stop();
                break;
            }
            _ = int.recv() => {
                info!("received SIGINT");
                engine.stop();
                break;
            }
            _ = usr1.recv() => {
                info!("received SIGUSR1");
                engine.pause();
            }
            _ = usr2.recv() => {
                info!("received SIGUSR2");
                engine.resume();
            }
        }
    }
    Ok(())
}
