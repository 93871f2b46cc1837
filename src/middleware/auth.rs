// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ID-token authentication middleware.

use crate::services::AuthError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Authenticated user extracted from a verified ID token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
}

/// Middleware that requires a valid Firebase ID token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(h) if h.starts_with("Bearer ") => &h[7..],
        _ => return Err(StatusCode::UNAUTHORIZED),
    };

    match state.identity.verify_id_token(token).await {
        Ok(user) => {
            request.extensions_mut().insert(AuthUser { uid: user.uid });
            Ok(next.run(request).await)
        }
        Err(AuthError::Forbidden(msg)) => {
            tracing::warn!(reason = %msg, "Rejected ID token");
            Err(StatusCode::UNAUTHORIZED)
        }
        Err(AuthError::Transient(msg)) => {
            tracing::error!(reason = %msg, "ID token verification unavailable");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
