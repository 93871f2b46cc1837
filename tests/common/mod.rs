// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use casal_api::config::Config;
use casal_api::db::{collections, FirestoreDb};
use casal_api::models::User;
use casal_api::routes::create_router;
use casal_api::services::{dispatcher, IdentityVerifier, PushService};
use casal_api::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = test_db_offline();
    let identity =
        Arc::new(IdentityVerifier::new(&config).expect("Failed to build test verifier"));
    let push = PushService::new_mock();

    let state = Arc::new(AppState {
        config,
        db,
        identity,
        push,
    });

    (create_router(state.clone()), state)
}

/// Generate a unique document id for test isolation.
#[allow(dead_code)]
pub fn unique_id(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}_{nanos}")
}

/// Generate a unique phone number for test isolation (tests run in
/// parallel against one shared emulator).
#[allow(dead_code)]
pub fn unique_phone() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("119{:010}", nanos % 10_000_000_000)
}

/// Helper to create a basic test user.
#[allow(dead_code)]
pub fn test_user(nome: &str, telefone: &str, foguinhos: i64) -> User {
    User {
        nome: Some(nome.to_string()),
        telefone: Some(telefone.to_string()),
        foguinhos,
        ..Default::default()
    }
}

/// Helper to create a mutually paired test user.
#[allow(dead_code)]
pub fn paired_user(
    nome: &str,
    telefone: &str,
    foguinhos: i64,
    partner_uid: &str,
    partner_phone: &str,
) -> User {
    User {
        nome: Some(nome.to_string()),
        telefone: Some(telefone.to_string()),
        foguinhos,
        pareado_uid: Some(partner_uid.to_string()),
        pareado_com: Some(partner_phone.to_string()),
        ..Default::default()
    }
}

/// Write an input document and run it through the dispatcher.
#[allow(dead_code)]
pub async fn enqueue_and_process(
    db: &FirestoreDb,
    input_id: &str,
    input: serde_json::Value,
) {
    db.upsert(collections::INPUTS, input_id, &input)
        .await
        .expect("Failed to write input");
    dispatcher::process_input(db, input_id)
        .await
        .expect("Dispatcher failed");
}

/// RFC3339 timestamp `days` calendar days before now (UTC).
#[allow(dead_code)]
pub fn days_ago_rfc3339(days: i64) -> String {
    casal_api::time_utils::format_utc_rfc3339(chrono::Utc::now() - chrono::Duration::days(days))
}
