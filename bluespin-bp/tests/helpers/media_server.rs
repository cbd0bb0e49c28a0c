//! In-process media server speaking the Plex-style JSON dialect
//!
//! Serves a scripted set of playlists over a real TCP listener so the
//! daemon's HTTP client stack is exercised end to end. Also records the
//! request count and the last access token seen, for assertions.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted track
#[derive(Clone)]
pub struct MockTrack {
    pub rating_key: String,
    pub title: String,
    pub part_key: Option<String>,
}

impl MockTrack {
    /// Track with a playable part derived from its id
    pub fn new(rating_key: &str, title: &str) -> Self {
        Self {
            rating_key: rating_key.to_string(),
            title: title.to_string(),
            part_key: Some(format!("/library/parts/{rating_key}/0/file.mp3")),
        }
    }

    /// Track with no media parts at all
    pub fn without_part(rating_key: &str, title: &str) -> Self {
        Self {
            rating_key: rating_key.to_string(),
            title: title.to_string(),
            part_key: None,
        }
    }
}

#[derive(Clone)]
struct MockPlaylist {
    id: u64,
    title: String,
    tracks: Vec<MockTrack>,
}

struct ServerState {
    playlists: Vec<MockPlaylist>,
    items_status_override: Option<u16>,
    requests: AtomicUsize,
    last_token: Mutex<Option<String>>,
}

/// Handle to a running mock server
pub struct MockMediaServer {
    base_url: String,
    state: Arc<ServerState>,
}

impl MockMediaServer {
    pub fn builder() -> MediaServerBuilder {
        MediaServerBuilder {
            playlists: Vec::new(),
            items_status_override: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Total requests served so far
    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// `X-Plex-Token` header of the most recent request, if any
    pub fn last_token(&self) -> Option<String> {
        self.state.last_token.lock().unwrap().clone()
    }
}

pub struct MediaServerBuilder {
    playlists: Vec<MockPlaylist>,
    items_status_override: Option<u16>,
}

impl MediaServerBuilder {
    /// Add a playlist with the given tracks
    pub fn playlist(mut self, id: u64, title: &str, tracks: Vec<MockTrack>) -> Self {
        self.playlists.push(MockPlaylist {
            id,
            title: title.to_string(),
            tracks,
        });
        self
    }

    /// Make every items request fail with the given status
    pub fn items_error(mut self, status: u16) -> Self {
        self.items_status_override = Some(status);
        self
    }

    /// Bind an ephemeral port and start serving
    pub async fn start(self) -> MockMediaServer {
        let state = Arc::new(ServerState {
            playlists: self.playlists,
            items_status_override: self.items_status_override,
            requests: AtomicUsize::new(0),
            last_token: Mutex::new(None),
        });

        let app = Router::new()
            .route("/playlists", get(list_playlists))
            .route("/playlists/:id/items", get(list_items))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock media server");
        let addr = listener.local_addr().expect("mock server local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server");
        });

        MockMediaServer {
            base_url: format!("http://{addr}"),
            state,
        }
    }
}

async fn list_playlists(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Json<Value> {
    note_request(&state, &headers);

    let metadata: Vec<Value> = state
        .playlists
        .iter()
        .map(|p| {
            json!({
                "ratingKey": p.id.to_string(),
                "title": p.title,
            })
        })
        .collect();

    Json(json!({
        "MediaContainer": {
            "size": metadata.len(),
            "Metadata": metadata,
        }
    }))
}

async fn list_items(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    note_request(&state, &headers);

    if let Some(status) = state.items_status_override {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, Json(json!({"error": "scripted failure"}))).into_response();
    }

    let Some(playlist) = state.playlists.iter().find(|p| p.id == id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "playlist not found"})),
        )
            .into_response();
    };

    let metadata: Vec<Value> = playlist.tracks.iter().map(track_json).collect();

    Json(json!({
        "MediaContainer": {
            "size": metadata.len(),
            "Metadata": metadata,
        }
    }))
    .into_response()
}

fn track_json(track: &MockTrack) -> Value {
    let mut value = json!({
        "ratingKey": track.rating_key,
        "title": track.title,
    });
    if let Some(part_key) = &track.part_key {
        value["Media"] = json!([{"Part": [{"key": part_key}]}]);
    }
    value
}

fn note_request(state: &ServerState, headers: &HeaderMap) {
    state.requests.fetch_add(1, Ordering::SeqCst);

    let token = headers
        .get("X-Plex-Token")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    if token.is_some() {
        *state.last_token.lock().unwrap() = token;
    }
}
