use super::state::{AppState, SessionEntry};
use crate::dialog::schedule_auto_stop;
use crate::error::CaptureError;
use crate::session::{CloseTrigger, RecordingSession, TeardownTrigger};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CloseQuery {
    /// Dismissal control that closed the dialog (default: button)
    pub trigger: Option<CloseTrigger>,
}

#[derive(Debug, Serialize)]
pub struct CloseResponse {
    pub session_id: String,
    pub status: String,
    pub trigger: CloseTrigger,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,

    /// Machine-readable capture error kind, when one applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

fn not_found(session_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Session {} not found", session_id),
            kind: None,
        }),
    )
        .into_response()
}

fn capture_error(err: &CaptureError) -> Response {
    let status = match err {
        CaptureError::PermissionDenied => StatusCode::FORBIDDEN,
        CaptureError::DeviceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        CaptureError::EmptyCapture => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            kind: Some(err.kind()),
        }),
    )
        .into_response()
}

fn snapshot(session: &RecordingSession) -> Response {
    (StatusCode::OK, Json(session.snapshot())).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /voice-notes/sessions
/// Open a capture session in Idle
pub async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let session = Arc::new(RecordingSession::new(
        state.session_defaults.fresh(),
        Arc::clone(&state.backend),
        state.previews.clone(),
    ));
    let session_id = session.id().to_string();

    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(session_id.clone(), SessionEntry::new(Arc::clone(&session)));
    }

    info!("Opened voice note session: {}", session_id);
    (StatusCode::CREATED, Json(session.snapshot()))
}

/// GET /voice-notes/sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.session(&session_id).await {
        Some(session) => snapshot(&session),
        None => not_found(&session_id),
    }
}

/// POST /voice-notes/sessions/:session_id/start
/// Request the input device and begin recording
///
/// Completes once the device request resolves. Closing the session while
/// this is pending releases the device as soon as it arrives.
pub async fn start_recording(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Some(session) = state.session(&session_id).await else {
        return not_found(&session_id);
    };

    match session.start().await {
        Ok(()) => {
            schedule_auto_stop(&session, state.max_recording);
            snapshot(&session)
        }
        Err(e) => {
            warn!("Failed to start recording for {}: {}", session_id, e);
            capture_error(&e)
        }
    }
}

/// POST /voice-notes/sessions/:session_id/stop
pub async fn stop_recording(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Some(session) = state.session(&session_id).await else {
        return not_found(&session_id);
    };

    match session.stop() {
        Ok(_) => snapshot(&session),
        Err(e) => capture_error(&e),
    }
}

/// POST /voice-notes/sessions/:session_id/rerecord
/// Discard the captured note and record again
pub async fn re_record(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Some(session) = state.session(&session_id).await else {
        return not_found(&session_id);
    };

    match session.re_record().await {
        Ok(()) => {
            schedule_auto_stop(&session, state.max_recording);
            snapshot(&session)
        }
        Err(e) => capture_error(&e),
    }
}

/// POST /voice-notes/sessions/:session_id/reset
pub async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Some(session) = state.session(&session_id).await else {
        return not_found(&session_id);
    };

    session.reset();
    snapshot(&session)
}

/// DELETE /voice-notes/sessions/:session_id?trigger=button|backdrop|escape
/// Close the dialog and release everything the session holds
pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<CloseQuery>,
) -> impl IntoResponse {
    let session = {
        let mut sessions = state.sessions.write().await;
        sessions.remove(&session_id).map(|entry| entry.session)
    };

    let Some(session) = session else {
        return not_found(&session_id);
    };

    let trigger = query.trigger.unwrap_or_default();
    session.teardown(TeardownTrigger::Close(trigger));

    (
        StatusCode::OK,
        Json(CloseResponse {
            session_id,
            status: "closed".to_string(),
            trigger,
        }),
    )
        .into_response()
}

/// GET /voice-notes/previews/:preview_id
/// Serve a captured voice note while its preview is live
pub async fn get_preview(
    State(state): State<AppState>,
    Path(preview_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.previews.resolve(preview_id) {
        Some(artifact) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, artifact.mime_type().to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("inline; filename=\"{}\"", artifact.suggested_name()),
                ),
            ],
            artifact.bytes().to_vec(),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Preview {} not found", preview_id),
                kind: None,
            }),
        )
            .into_response(),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
