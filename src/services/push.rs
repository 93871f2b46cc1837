// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Push delivery: hands notification documents off to FCM.
//!
//! Fire-and-forget by contract: a notification document written means a
//! push attempt is eventually made. Delivery failures are logged, never
//! propagated back into the state machine. Tokens FCM reports as
//! unregistered are pruned from the user record.

use crate::db::FirestoreDb;
use crate::error::AppError;
use std::sync::Arc;

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const DEFAULT_ICON: &str = "/assets/icons/favicon.png";

/// FCM HTTP v1 client.
#[derive(Clone)]
pub struct PushService {
    http: reqwest::Client,
    project_id: String,
    token_generator: Option<Arc<gcloud_sdk::GoogleAuthTokenGenerator>>,
}

impl PushService {
    /// Create a push service using application-default credentials.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        let token_generator = gcloud_sdk::GoogleAuthTokenGenerator::new(
            gcloud_sdk::TokenSourceType::Default,
            vec![FCM_SCOPE.to_string()],
        )
        .await
        .map_err(|e| AppError::Fcm(format!("Failed to initialize FCM credentials: {}", e)))?;

        Ok(Self {
            http: reqwest::Client::new(),
            project_id: project_id.to_string(),
            token_generator: Some(Arc::new(token_generator)),
        })
    }

    /// Create a disabled push service for testing (delivery is a no-op).
    pub fn new_mock() -> Self {
        Self {
            http: reqwest::Client::new(),
            project_id: "test-project".to_string(),
            token_generator: None,
        }
    }

    /// Deliver one notification document as a push message.
    ///
    /// Missing documents, missing device tokens and FCM failures all
    /// resolve as logged no-ops.
    pub async fn deliver(&self, db: &FirestoreDb, notification_id: &str) -> Result<(), AppError> {
        let Some(notification) = db.get_notification(notification_id).await? else {
            tracing::warn!(notification_id, "Notification event without a document");
            return Ok(());
        };

        let user_id = notification.user_id.clone();
        let Some(user) = db.get_user(&user_id).await? else {
            tracing::error!(notification_id, user_id = %user_id, "Notification target user not found");
            return Ok(());
        };
        let Some(fcm_token) = user.fcm_token else {
            tracing::info!(notification_id, user_id = %user_id, "User has no FCM token");
            return Ok(());
        };

        let Some(generator) = self.token_generator.as_ref() else {
            tracing::debug!(notification_id, "Push delivery disabled (mock)");
            return Ok(());
        };

        let auth_token = generator
            .create_token()
            .await
            .map_err(|e| AppError::Fcm(format!("Failed to mint FCM token: {}", e)))?;

        // Data-only message: the service worker renders the notification.
        let payload = serde_json::json!({
            "message": {
                "token": fcm_token,
                "data": {
                    "title": notification.titulo,
                    "body": notification.mensagem,
                    "icon": DEFAULT_ICON,
                }
            }
        });

        let url = format!(
            "https://fcm.googleapis.com/v1/projects/{}/messages:send",
            self.project_id
        );
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, auth_token.header_value())
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(notification_id, user_id = %user_id, "Push notification sent");
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                tracing::error!(
                    notification_id,
                    user_id = %user_id,
                    %status,
                    body = %body,
                    "FCM rejected push"
                );

                // Stale device registration: prune the token so we stop trying.
                if status == reqwest::StatusCode::NOT_FOUND || body.contains("UNREGISTERED") {
                    if let Err(e) = db.clear_fcm_token(&user_id).await {
                        tracing::error!(user_id = %user_id, error = %e, "Failed to prune FCM token");
                    } else {
                        tracing::info!(user_id = %user_id, "Pruned unregistered FCM token");
                    }
                }
            }
            Err(e) => {
                tracing::error!(notification_id, user_id = %user_id, error = %e, "FCM request failed");
            }
        }

        Ok(())
    }
}
