//! aircast — unattended radio-broadcast audio player
//!
//! Host binary: parses the command line, initializes logging, wires the
//! scheduler, status endpoint and playback engine together, and runs
//! until a termination signal lands.

use aircast::playback::engine::PlaybackEngine;
use aircast::schedule::Scheduler;
use aircast::server::StatusServer;
use aircast::status::StatusHandle;
use aircast::{logging, signals};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

/// Exit codes per subsystem, so supervisors can tell failures apart.
const EXIT_SCHEDULER: u8 = 1;
const EXIT_STATUS: u8 = 2;
const EXIT_PLAYER: u8 = 3;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level 0..4 (silent, error, warn, info, debug)
    #[arg(short = 'd', long = "debug-level", value_name = "LEVEL", default_value_t = 3)]
    debug_level: u8,

    /// Hex debug-facility bitmask, gates debug output per subsystem
    #[arg(short = 'm', long = "debug-mask", value_name = "MASK")]
    debug_mask: Option<String>,

    /// TCP port for the now-playing status endpoint
    #[arg(short = 'p', long = "port", value_name = "PORT", default_value_t = 9670)]
    port: u16,

    /// Path to the XML week schedule
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mask = match args.debug_mask.as_deref() {
        Some(raw) => match u32::from_str_radix(raw.trim_start_matches("0x"), 16) {
            Ok(mask) => mask,
            Err(e) => {
                eprintln!("failed to parse debug mask {raw:?}: {e}");
                logging::facility::DEFAULT
            }
        },
        None => logging::facility::DEFAULT,
    };
    logging::init(args.debug_level, mask);

    info!("aircast starting");

    let scheduler = match Scheduler::new(&args.config) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            error!("unable to initialize scheduler: {e}");
            return ExitCode::from(EXIT_SCHEDULER);
        }
    };

    let status = Arc::new(StatusHandle::new());
    let server = match StatusServer::bind(args.port).await {
        Ok(server) => server,
        Err(e) => {
            error!("unable to initialize status endpoint: {e}");
            return ExitCode::from(EXIT_STATUS);
        }
    };

    let engine = Arc::new(PlaybackEngine::new(scheduler, Arc::clone(&status)));

    // The status endpoint lives exactly as long as playback does.
    let server_stop = Arc::new(tokio::sync::Notify::new());
    let server_stopped = Arc::clone(&server_stop);
    let server_task = tokio::spawn(server.serve(status, async move {
        server_stopped.notified().await;
    }));

    let signal_engine = Arc::clone(&engine);
    let signal_task = tokio::spawn(async move {
        if let Err(e) = signals::dispatch(signal_engine).await {
            error!("signal dispatch failed: {e}");
        }
    });

    // The engine owns real threads and the output stream; give it a
    // blocking thread and wait for it to come back.
    let run_engine = Arc::clone(&engine);
    let engine_result = tokio::task::spawn_blocking(move || run_engine.run()).await;

    signal_task.abort();
    server_stop.notify_one();
    let _ = server_task.await;

    match engine_result {
        Ok(Ok(())) => {
            info!("graceful exit");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            error!("player failed: {e}");
            ExitCode::from(EXIT_PLAYER)
        }
        Err(e) => {
            error!("player thread panicked: {e}");
            ExitCode::from(EXIT_PLAYER)
        }
    }
}
