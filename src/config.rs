//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables by the deployment
//! (Cloud Run secret bindings), so there is no separate secret fetch.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// GCP project ID (Firestore + FCM)
    pub gcp_project_id: String,
    /// Firebase project ID used as issuer/audience of client ID tokens.
    /// Usually equal to `gcp_project_id`.
    pub firebase_project_id: String,
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Random path segment guarding the document-event callback routes
    pub events_path_uuid: String,
    /// Optional HS256 key for verifying locally minted test ID tokens.
    /// When set, RS256 verification against Google certs is bypassed.
    pub auth_test_hs256_key: Option<Vec<u8>>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let gcp_project_id =
            env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string());

        Ok(Self {
            firebase_project_id: env::var("FIREBASE_PROJECT_ID")
                .unwrap_or_else(|_| gcp_project_id.clone()),
            gcp_project_id,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            events_path_uuid: env::var("EVENTS_PATH_UUID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("EVENTS_PATH_UUID"))?,
            auth_test_hs256_key: env::var("AUTH_TEST_HS256_KEY")
                .ok()
                .map(String::into_bytes),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            firebase_project_id: "test-project".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            events_path_uuid: "test-events-uuid".to_string(),
            auth_test_hs256_key: Some(b"test_jwt_key_32_bytes_minimum!!".to_vec()),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
