// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! HTTP adapter: play named samples, stream raw audio, and discard channels.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, warn};

use crate::audio::sample_source::{Playback, SampleSourceError};
use crate::engine::{Engine, EngineError};

fn default_wait() -> bool {
    true
}

/// Body of `POST /api/play`.
#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    /// Sample name, relative to the library directory and without extension.
    file: String,
    /// Channel to queue on. Plays as a one-shot when absent.
    channel: Option<String>,
    /// Respond only after playback has finished.
    #[serde(default = "default_wait")]
    wait: bool,
}

/// Query of `POST /api/stream`.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    channel: Option<String>,
    #[serde(default)]
    wait: bool,
}

/// Body of `POST /api/discard`.
#[derive(Debug, Deserialize)]
pub struct DiscardRequest {
    channel: String,
}

/// Builds the router for the HTTP API. Request bodies are unlimited unless
/// `max_body_size` is given.
pub fn router(engine: Arc<Engine>, max_body_size: Option<usize>) -> Router {
    let body_limit = match max_body_size {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/api/play", post(play))
        .route("/api/stream", post(stream))
        .route("/api/discard", post(discard))
        .layer(body_limit)
        .with_state(engine)
}

/// Loads and plays a sample from the library.
pub async fn play(
    State(engine): State<Arc<Engine>>,
    Json(request): Json<PlayRequest>,
) -> Response {
    info!(
        file = request.file,
        channel = request.channel,
        wait = request.wait,
        "Play request"
    );

    let PlayRequest { file, channel, wait } = request;
    // Decoding can take a while on first use.
    let result =
        tokio::task::spawn_blocking(move || engine.play_sample(&file, channel.as_deref())).await;
    respond(result, wait).await
}

/// Decodes the request body and plays it.
pub async fn stream(
    State(engine): State<Arc<Engine>>,
    Query(query): Query<StreamQuery>,
    body: Bytes,
) -> Response {
    info!(
        bytes = body.len(),
        channel = query.channel,
        wait = query.wait,
        "Stream request"
    );

    let StreamQuery { channel, wait } = query;
    let result =
        tokio::task::spawn_blocking(move || engine.play_data(body.to_vec(), channel.as_deref()))
            .await;
    respond(result, wait).await
}

/// Drops everything queued on a channel.
pub async fn discard(
    State(engine): State<Arc<Engine>>,
    Json(request): Json<DiscardRequest>,
) -> Response {
    if engine.discard(&request.channel) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (StatusCode::NOT_FOUND, format!("no channel named {}", request.channel)).into_response()
    }
}

async fn respond(
    result: Result<Result<Playback, EngineError>, tokio::task::JoinError>,
    wait: bool,
) -> Response {
    let playback = match result {
        Ok(Ok(playback)) => playback,
        Ok(Err(e)) => return error_response(e),
        Err(e) => {
            warn!(err = %e, "Play task failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if wait && !playback.finished().await {
        info!("Playback was discarded before it finished");
    }
    StatusCode::NO_CONTENT.into_response()
}

fn status(e: &EngineError) -> StatusCode {
    match e {
        EngineError::Source(SampleSourceError::NotFound(_)) => StatusCode::NOT_FOUND,
        EngineError::Source(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::NotAChannel(_) => StatusCode::CONFLICT,
    }
}

fn error_response(e: EngineError) -> Response {
    let status = status(&e);
    warn!(err = %e, status = status.as_u16(), "Play request failed");
    (status, e.to_string()).into_response()
}
