//! Now-playing HTTP endpoint
//!
//! A deliberately tiny surface: every inbound request, whatever the
//! path, gets the same JSON document describing the current and next
//! track, and the connection is closed. Consumers are station
//! dashboards and scripts that poll once in a while; the serialized
//! body is rebuilt at most once per second, only the elapsed counter is
//! always fresh.

use crate::error::{Error, Result};
use crate::status::{StatusHandle, TrackFacts};
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::any;
use axum::Router;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::info;

/// How long a serialized body may be served before rebuilding.
const CACHE_SECS: u64 = 1;

struct ServerState {
    status: Arc<StatusHandle>,
    cache: Mutex<Option<(Instant, Value)>>,
}

pub struct StatusServer {
    listener: tokio::net::TcpListener,
}

impl StatusServer {
    /// Bind the listening socket. Failing to bind is an init error the
    /// host treats as fatal.
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| Error::Status(format!("cannot bind port {port}: {e}")))?;
        info!("status endpoint listening on port {port}");
        Ok(Self { listener })
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve(
        self,
        status: Arc<StatusHandle>,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let state = Arc::new(ServerState {
            status,
            cache: Mutex::new(None),
        });

        // Any method on any path gets the same document; consumers
        // range from dashboards to `nc`-grade scripts.
        let app = Router::new()
            .route("/", any(now_playing))
            .fallback(any(now_playing))
            .with_state(state);

        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Status(e.to_string()))
    }
}

async fn now_playing(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let mut body = {
        let mut cache = state.cache.lock().unwrap();
        let stale = cache
            .as_ref()
            .map_or(true, |(built, _)| built.elapsed().as_secs() >= CACHE_SECS);
        if stale {
            let snap = state.status.snapshot();
            *cache = Some((Instant::now(), build_body(&snap.current, &snap.next)));
        }
        cache.as_ref().map(|(_, v)| v.clone()).unwrap_or(Value::Null)
    };

    // The elapsed counter is refreshed on every request.
    body["current_song"]["Elapsed"] = json!(state.status.elapsed_secs().to_string());

    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CONNECTION, "close"),
        ],
        body.to_string(),
    )
}

fn build_body(current: &Option<TrackFacts>, next: &Option<TrackFacts>) -> Value {
    json!({
        "current_song": song_fields(current),
        "next_song": song_fields(next),
    })
}

/// Elapsed is patched in per request for the current song only.
fn song_fields(facts: &Option<TrackFacts>) -> Value {
    let empty = TrackFacts::default();
    let f = facts.as_ref().unwrap_or(&empty);
    json!({
        "Artist": sanitize(&f.artist),
        "Album": sanitize(&f.album),
        "Title": sanitize(&f.title),
        "Path": f.path,
        "Duration": f.duration_secs.to_string(),
        "Zone": sanitize(&f.zone),
        "MusicBrainz Album Id": sanitize(&f.album_id),
        "MusicBrainz Release Track Id": sanitize(&f.release_track_id),
    })
}

/// Keep non-path fields free of characters that trip up consumers that
/// cannot cope with mid-string escapes: backslashes become slashes,
/// double quotes become single quotes. Paths are left intact and rely
/// on JSON escaping.
fn sanitize(field: &str) -> String {
    field.replace('\\', "/").replace('"', "'")
}
