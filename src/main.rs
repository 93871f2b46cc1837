// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Casal-API Server
//!
//! Processes queued inputs for the couples-pairing app: gifts, pairing
//! requests/responses, daily check-ins and moment redemptions, plus the
//! notification push hand-off.

use casal_api::{
    config::Config,
    db::FirestoreDb,
    services::{IdentityVerifier, PushService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Casal-API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Initialize ID-token verification
    let identity =
        Arc::new(IdentityVerifier::new(&config).expect("Failed to initialize identity verifier"));

    // Initialize FCM push delivery. Against the emulator there are no
    // application-default credentials, so delivery runs disabled.
    let push = if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
        tracing::warn!("Emulator detected; push delivery disabled");
        PushService::new_mock()
    } else {
        PushService::new(&config.gcp_project_id)
            .await
            .expect("Failed to initialize push service")
    };
    tracing::info!("Push service initialized");

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        identity,
        push,
    });

    // Build router
    let app = casal_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("casal_api=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
