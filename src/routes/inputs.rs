// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated command ingress: creates input documents.
//!
//! The only synchronous surface of the state machine. Everything after the
//! input document lands is asynchronous; clients observe outcomes by
//! listening on the created document.

use crate::db::collections;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Input, InputKind};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Command ingress routes (require authentication).
/// The auth middleware is applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/inputs", post(create_input))
}

/// Request envelope: the raw input object as the client would write it.
#[derive(Debug, Deserialize)]
struct CreateInputRequest {
    input: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize)]
struct CreateInputResponse {
    ok: bool,
    id: String,
}

/// Create an input document with admin privileges.
///
/// The declared `fromUid` must match the verified token subject; the type
/// must be one of the seven supported commands. Lifecycle fields are forced
/// server-side so a client cannot pre-mark an input as processed.
async fn create_input(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateInputRequest>,
) -> Result<Json<CreateInputResponse>> {
    let declared_from = request
        .input
        .get("fromUid")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    if declared_from != user.uid {
        return Err(AppError::Forbidden("fromUid_mismatch".to_string()));
    }

    let kind = request
        .input
        .get("type")
        .and_then(|v| v.as_str())
        .and_then(InputKind::parse)
        .ok_or_else(|| AppError::BadRequest("unsupported_type".to_string()))?;

    let mut input: Input =
        serde_json::from_value(serde_json::Value::Object(request.input))
            .map_err(|e| AppError::BadRequest(format!("malformed input: {e}")))?;

    let now = chrono::Utc::now();
    input.processed = false;
    input.error = None;
    input.retry_count = 0;
    input.processed_at = None;
    input.processed_by = None;
    input
        .payload
        .insert("timestamp".to_string(), format_utc_rfc3339(now).into());

    let input_id = format!(
        "{}_{}",
        user.uid,
        now.timestamp_nanos_opt().unwrap_or_default()
    );
    state.db.upsert(collections::INPUTS, &input_id, &input).await?;

    tracing::info!(
        input_id = %input_id,
        uid = %user.uid,
        kind = kind.as_str(),
        "Input created"
    );

    Ok(Json(CreateInputResponse {
        ok: true,
        id: input_id,
    }))
}
