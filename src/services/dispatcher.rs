// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Input dispatcher: routes a created input document to its transition
//! handler and records failures on the input itself.
//!
//! No error escapes this module. Rejected inputs stay `processed:false`
//! with a stable `error` code for the client to read; unexpected handler
//! failures additionally bump `retryCount`. Nothing here retries: a
//! failed input stays failed until a human or external tool resubmits it.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{InputError, InputKind};
use crate::services::transitions::{
    daily_check_in, gift, moment_redeem, pairing_cancel, pairing_request, pairing_response,
    pairing_unpair, TransitionOutcome,
};
use chrono::Utc;

/// Process a newly created input document.
///
/// Returns an error only for infrastructure failures that happen before a
/// handler took responsibility for the input (e.g. the initial load); those
/// are safe for the event layer to redeliver.
pub async fn process_input(db: &FirestoreDb, input_id: &str) -> Result<(), AppError> {
    let now = Utc::now();

    let Some(input) = db.get_input(input_id).await? else {
        tracing::warn!(input_id, "Input event without a document");
        return Ok(());
    };

    // Cheap pre-check; the authoritative guard is re-read inside each
    // handler's transaction.
    if input.processed {
        tracing::debug!(input_id, "Input already processed");
        return Ok(());
    }

    let Some(kind) = input.kind.as_deref().and_then(InputKind::parse) else {
        tracing::warn!(input_id, kind = ?input.kind, "Unsupported input type");
        annotate(db, input_id, InputError::UnsupportedType.code(), false).await;
        return Ok(());
    };

    let result = match kind {
        InputKind::Gift => gift::apply(db, input_id, &input, now).await,
        InputKind::PairingRequest => pairing_request::apply(db, input_id, &input, now).await,
        InputKind::PairingResponse => pairing_response::apply(db, input_id, &input, now).await,
        InputKind::PairingCancel => pairing_cancel::apply(db, input_id, &input, now).await,
        InputKind::PairingUnpair => pairing_unpair::apply(db, input_id, &input, now).await,
        InputKind::DailyCheckIn => daily_check_in::apply(db, input_id, &input, now).await,
        InputKind::MomentRedeem => moment_redeem::apply(db, input_id, &input, now).await,
    };

    match result {
        Ok(TransitionOutcome::Applied) => {}
        Ok(TransitionOutcome::AlreadyProcessed) | Ok(TransitionOutcome::Noop) => {
            tracing::debug!(input_id, kind = kind.as_str(), "Input resolved as no-op");
        }
        Ok(TransitionOutcome::Skipped(code)) => {
            tracing::info!(input_id, kind = kind.as_str(), code = code.code(), "Input skipped");
        }
        Ok(TransitionOutcome::Rejected(code)) => {
            // Second phase of the two-phase error write: the handler's
            // transaction is already rolled back.
            tracing::info!(input_id, kind = kind.as_str(), code = code.code(), "Input rejected");
            annotate(db, input_id, code.code(), false).await;
        }
        Err(err) => {
            tracing::error!(input_id, kind = kind.as_str(), error = %err, "Input handler failed");
            annotate(db, input_id, &err.to_string(), true).await;
        }
    }

    Ok(())
}

/// Best-effort error annotation; failures here are only logged.
async fn annotate(db: &FirestoreDb, input_id: &str, code: &str, bump_retry: bool) {
    if let Err(e) = db.annotate_input_error(input_id, code, bump_retry).await {
        tracing::error!(input_id, error = %e, "Failed to annotate input error");
    }
}
