// SPDX-License-Identifier: MIT

//! HTTP front end
//!
//! Thin handlers over the [`PhaseController`]: triggering and resuming
//! schedule the actual pipeline work on background tasks, so callers get an
//! acknowledgement as soon as the session bookkeeping is done.

use crate::flow::FlowError;
use crate::intel::phases::{PhaseController, DEFAULT_TRIGGER};
use crate::intel::tools::args;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub async fn serve(
    port: u16,
    controller: Arc<PhaseController>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(controller);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(controller: Arc<PhaseController>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/runs", post(start_run))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/{id}", get(session_status))
        .route("/api/sessions/{id}/resume", post(resume_session))
        .route("/api/sessions/{id}/events", get(session_events))
        .route("/api/tools", get(list_tools))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(controller)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "strategic intelligence workflow" }))
}

#[derive(Deserialize)]
struct RunRequest {
    #[serde(default = "default_trigger")]
    trigger: String,
}

fn default_trigger() -> String {
    DEFAULT_TRIGGER.to_string()
}

#[derive(Deserialize)]
struct ResumeRequest {
    user_input: String,
}

async fn start_run(
    State(controller): State<Arc<PhaseController>>,
    Json(payload): Json<RunRequest>,
) -> Response {
    let session_id = PhaseController::mint_session_id();

    let state = match controller.open_session(&session_id, &payload.trigger).await {
        Ok(state) => state,
        Err(e) => return error_response(&e),
    };

    let background = controller.clone();
    let background_id = session_id.clone();
    tokio::spawn(async move {
        if let Err(e) = background.run_session(&background_id, state).await {
            log::error!("session {}: phase 1 run failed: {}", background_id, e);
        }
    });

    Json(json!({ "session_id": session_id, "message": "workflow started" })).into_response()
}

async fn resume_session(
    State(controller): State<Arc<PhaseController>>,
    Path(id): Path<String>,
    Json(payload): Json<ResumeRequest>,
) -> Response {
    // Claim the checkpoint synchronously so conflicts surface in the
    // response; the continuation runs in the background.
    let checkpoint = match controller.claim_checkpoint(&id).await {
        Ok(checkpoint) => checkpoint,
        Err(e) => return error_response(&e),
    };

    let background = controller.clone();
    let background_id = id.clone();
    let user_input = payload.user_input.clone();
    tokio::spawn(async move {
        if let Err(e) = background
            .resume_from(&background_id, checkpoint, &user_input)
            .await
        {
            log::error!("session {}: resume failed: {}", background_id, e);
        }
    });

    Json(json!({ "message": format!("resuming workflow with: {}", payload.user_input) }))
        .into_response()
}

async fn session_status(
    State(controller): State<Arc<PhaseController>>,
    Path(id): Path<String>,
) -> Response {
    match controller.status(&id).await {
        Some(snapshot) => Json(snapshot).into_response(),
        None => not_found(&id),
    }
}

async fn list_sessions(State(controller): State<Arc<PhaseController>>) -> Json<Value> {
    Json(json!({ "sessions": controller.list().await }))
}

/// Streams status snapshots until the session reaches a terminal status
async fn session_events(
    State(controller): State<Arc<PhaseController>>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(16);

    tokio::spawn(async move {
        loop {
            let Some(snapshot) = controller.status(&id).await else {
                break;
            };
            let terminal = snapshot.status.is_terminal();
            if tx.send(snapshot).await.is_err() {
                break;
            }
            if terminal {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    });

    let stream = ReceiverStream::new(rx)
        .map(|snapshot| Ok(Event::default().json_data(&snapshot).unwrap_or_default()));

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new().interval(Duration::from_secs(1)),
    )
}

async fn list_tools() -> Json<Value> {
    let tools: Vec<Value> = args::schemas()
        .into_iter()
        .map(|(name, schema)| {
            json!({
                "name": name,
                "input_schema": serde_json::to_value(schema).unwrap_or(Value::Null)
            })
        })
        .collect();
    Json(json!({ "tools": tools }))
}

fn not_found(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("session '{}' not found", id) })),
    )
        .into_response()
}

fn error_response(error: &FlowError) -> Response {
    let status = match error {
        FlowError::State(_) => StatusCode::NOT_FOUND,
        FlowError::Validation(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}
