// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Document-event callback routes.
//!
//! The platform's event layer (Eventarc push) delivers Firestore document
//! events here with at-least-once semantics. Bodies carry only the document
//! id plus, for update events, the prior status; handlers always re-read
//! current state, so redelivery and stale events are safe.
//!
//! The `{uuid}` path segment is a shared secret checked against config,
//! the same guard pattern as a webhook path UUID.

use crate::models::{RequestStatus, TaskStatus};
use crate::services::{dispatcher, reconciler, task_bonus};
use crate::AppState;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::post,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

/// Event callback routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/{uuid}/input-created", post(input_created))
        .route(
            "/events/{uuid}/pairing-request-updated",
            post(pairing_request_updated),
        )
        .route("/events/{uuid}/task-updated", post(task_updated))
        .route(
            "/events/{uuid}/notification-created",
            post(notification_created),
        )
}

/// Minimal event payload: the changed document, and for updates the status
/// before the change.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct DocumentEvent {
    #[validate(length(min = 1, max = 1500))]
    document_id: String,
    #[serde(default)]
    before_status: Option<String>,
}

fn check_path_uuid(state: &AppState, uuid: &str, route: &str) -> bool {
    if uuid != state.config.events_path_uuid {
        tracing::warn!(
            received_uuid = %uuid,
            route,
            "Security Alert: Event path UUID mismatch"
        );
        return false;
    }
    true
}

/// An input document was created: dispatch it to the state machine.
async fn input_created(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    Json(event): Json<DocumentEvent>,
) -> StatusCode {
    if !check_path_uuid(&state, &uuid, "input-created") {
        return StatusCode::NOT_FOUND;
    }
    if event.validate().is_err() {
        return StatusCode::BAD_REQUEST;
    }

    match dispatcher::process_input(&state.db, &event.document_id).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            // Pre-handler infrastructure failure: let the event layer
            // redeliver; the processed guard makes that safe.
            tracing::error!(input_id = %event.document_id, error = %e, "Input event failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// A pairing request's status changed outside the input queue.
async fn pairing_request_updated(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    Json(event): Json<DocumentEvent>,
) -> StatusCode {
    if !check_path_uuid(&state, &uuid, "pairing-request-updated") {
        return StatusCode::NOT_FOUND;
    }
    if event.validate().is_err() {
        return StatusCode::BAD_REQUEST;
    }

    let before = event
        .before_status
        .as_deref()
        .and_then(parse_request_status);

    match reconciler::on_request_updated(&state.db, &event.document_id, before).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::error!(request_id = %event.document_id, error = %e, "Request event failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// A moment task changed; the first move into `Realizado` pays the bonus.
async fn task_updated(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    Json(event): Json<DocumentEvent>,
) -> StatusCode {
    if !check_path_uuid(&state, &uuid, "task-updated") {
        return StatusCode::NOT_FOUND;
    }
    if event.validate().is_err() {
        return StatusCode::BAD_REQUEST;
    }

    let before = event
        .before_status
        .as_deref()
        .map(|s| serde_json::from_value::<TaskStatus>(serde_json::Value::String(s.to_string())))
        .and_then(|r| r.ok());

    match task_bonus::on_task_updated(&state.db, &event.document_id, before).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::error!(task_id = %event.document_id, error = %e, "Task event failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// A notification document was created: attempt push delivery.
async fn notification_created(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    Json(event): Json<DocumentEvent>,
) -> StatusCode {
    if !check_path_uuid(&state, &uuid, "notification-created") {
        return StatusCode::NOT_FOUND;
    }
    if event.validate().is_err() {
        return StatusCode::BAD_REQUEST;
    }

    match state.push.deliver(&state.db, &event.document_id).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::error!(notification_id = %event.document_id, error = %e, "Push event failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn parse_request_status(value: &str) -> Option<RequestStatus> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).ok()
}
