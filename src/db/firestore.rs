//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile + pairing/reward state)
//! - Inputs (queued commands and their lifecycle annotations)
//! - Transaction plumbing shared by all transition handlers
//!
//! Every transition handler runs as one atomic transaction built from
//! `begin` / `tx_get` / `tx_upsert` / `tx_delete` / `commit`. Reads use the
//! transaction's consistency selector so the `processed` guard and every
//! balance read observe a single snapshot; conflicting commits fail and the
//! event layer redelivers against fresh state.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Input, Notification, User};
use firestore::{FirestoreConsistencySelector, FirestoreTransaction};
use serde::{de::DeserializeOwned, Serialize};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Generic Document Operations ─────────────────────────────

    /// Get a document by id.
    pub async fn get_by_id<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or replace a document.
    pub async fn upsert<T>(&self, collection: &str, id: &str, obj: &T) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Sync + Send,
    {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(obj)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by uid.
    pub async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError> {
        self.get_by_id(collections::USUARIOS, uid).await
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, uid: &str, user: &User) -> Result<(), AppError> {
        self.upsert(collections::USUARIOS, uid, user).await
    }

    /// Find a user by their exact stored phone number.
    ///
    /// Matches the raw `telefone` field, which is how the app client writes
    /// lookups; digit-normalization only applies to pairing comparisons.
    pub async fn find_user_by_phone(
        &self,
        phone: &str,
    ) -> Result<Option<(String, User)>, AppError> {
        let docs = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USUARIOS)
            .filter(|q| q.for_all([q.field("telefone").eq(phone)]))
            .limit(1)
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let Some(doc) = docs.into_iter().next() else {
            return Ok(None);
        };

        let uid = doc
            .name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let user: User = firestore::firestore_document_to_serializable(&doc)
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(Some((uid, user)))
    }

    /// Clear a user's FCM token (invalid/unregistered device).
    ///
    /// Field-masked so concurrent writes to the rest of the record survive.
    pub async fn clear_fcm_token(&self, uid: &str) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(["fcmToken"])
            .in_col(collections::USUARIOS)
            .document_id(uid)
            .object(&serde_json::json!({ "fcmToken": null }))
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Input Operations ────────────────────────────────────────

    /// Get an input by id.
    pub async fn get_input(&self, input_id: &str) -> Result<Option<Input>, AppError> {
        self.get_by_id(collections::INPUTS, input_id).await
    }

    /// Record a failure code on an input, leaving it unprocessed.
    ///
    /// This is the second phase of the two-phase error write: the handler's
    /// transaction has already been rolled back, and this best-effort update
    /// only annotates the input's own lifecycle fields.
    pub async fn annotate_input_error(
        &self,
        input_id: &str,
        code: &str,
        bump_retry: bool,
    ) -> Result<(), AppError> {
        let retry_count = if bump_retry {
            self.get_input(input_id)
                .await?
                .map(|input| input.retry_count + 1)
        } else {
            None
        };

        let mut annotation = serde_json::json!({
            "error": code,
            "processed": false,
        });
        let mut fields = vec!["error", "processed"];
        if let Some(count) = retry_count {
            annotation["retryCount"] = serde_json::json!(count);
            fields.push("retryCount");
        }

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(fields)
            .in_col(collections::INPUTS)
            .document_id(input_id)
            .object(&annotation)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Notification Operations ─────────────────────────────────

    /// Get a notification by id (push delivery).
    pub async fn get_notification(
        &self,
        notification_id: &str,
    ) -> Result<Option<Notification>, AppError> {
        self.get_by_id(collections::NOTIFICACOES, notification_id)
            .await
    }

    // ─── Transaction Plumbing ────────────────────────────────────

    /// Begin a transaction.
    pub async fn begin(&self) -> Result<FirestoreTransaction<'_>, AppError> {
        self.get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))
    }

    /// Read a document at the transaction's snapshot.
    ///
    /// All reads a handler bases its writes on must go through this, so a
    /// conflicting concurrent commit fails this transaction instead of
    /// silently losing an update.
    pub async fn tx_get<T>(
        &self,
        tx: &FirestoreTransaction<'_>,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
                tx.transaction_id().clone(),
            ))
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read in transaction: {}", e)))
    }

    /// Stage a create-or-replace write in the transaction.
    pub fn tx_upsert<T>(
        &self,
        tx: &mut FirestoreTransaction<'_>,
        collection: &str,
        id: &str,
        obj: &T,
    ) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Sync + Send,
    {
        self.get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(obj)
            .add_to_transaction(tx)
            .map_err(|e| AppError::Database(format!("Failed to add write to transaction: {}", e)))?;
        Ok(())
    }

    /// Stage a delete in the transaction.
    pub fn tx_delete(
        &self,
        tx: &mut FirestoreTransaction<'_>,
        collection: &str,
        id: &str,
    ) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(id)
            .add_to_transaction(tx)
            .map_err(|e| {
                AppError::Database(format!("Failed to add delete to transaction: {}", e))
            })?;
        Ok(())
    }

    /// Commit a transaction.
    pub async fn commit(&self, tx: FirestoreTransaction<'_>) -> Result<(), AppError> {
        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
        Ok(())
    }

    /// Roll back a transaction, ignoring rollback failures (the server
    /// expires abandoned transactions on its own).
    pub async fn rollback(&self, tx: FirestoreTransaction<'_>) {
        if let Err(e) = tx.rollback().await {
            tracing::debug!(error = %e, "Transaction rollback failed");
        }
    }
}
