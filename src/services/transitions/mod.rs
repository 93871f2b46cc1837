// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transition handlers: the pairing/reward state machine.
//!
//! Each input type has one handler, and each handler is exactly one
//! Firestore transaction. The transaction re-reads the input first and
//! exits before any other read or write when `processed` is already set;
//! that flag is the sole idempotence guard against duplicate event
//! delivery. Validation and consistency failures roll the transaction
//! back and surface as [`TransitionOutcome::Rejected`], which the
//! dispatcher records on the input in a separate follow-up write.

pub mod daily_check_in;
pub mod gift;
pub mod moment_redeem;
pub mod pairing_cancel;
pub mod pairing_request;
pub mod pairing_response;
pub mod pairing_unpair;

use crate::db::{collections, FirestoreDb};
use crate::error::AppError;
use crate::models::{Input, InputError};
use firestore::FirestoreTransaction;

/// Gift amounts accepted per input.
pub const MAX_GIFT_AMOUNT: i64 = 50;
/// Balance credited to the partner for a daily check-in.
pub const DAILY_CHECK_IN_REWARD: i64 = 1;
/// Both members of a fresh couple start with at least this balance.
pub const MIN_FOGUINHOS_AFTER_PAIRING: i64 = 5;

/// How a transition handler resolved its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Transaction committed; input marked processed inside it.
    Applied,
    /// In-transaction `processed` guard hit (duplicate delivery); no-op.
    AlreadyProcessed,
    /// Stale or terminal-state input; marked processed with no error.
    Noop,
    /// Marked processed with a diagnostic code (e.g. same-day check-in).
    Skipped(InputError),
    /// Transaction rolled back before any write; the dispatcher records
    /// the code on the input.
    Rejected(InputError),
}

/// Result of the in-transaction input re-read.
pub(crate) enum InputGuard {
    /// Input exists and is unconsumed.
    Fresh(Box<Input>),
    /// Another delivery already consumed it.
    AlreadyProcessed,
}

/// Re-read the input at the transaction snapshot and check the
/// `processed` flag. Must be the first read of every handler transaction.
pub(crate) async fn read_input_guard(
    db: &FirestoreDb,
    tx: &FirestoreTransaction<'_>,
    input_id: &str,
) -> Result<InputGuard, AppError> {
    let Some(current) = db.tx_get::<Input>(tx, collections::INPUTS, input_id).await? else {
        return Err(AppError::NotFound(format!("input {input_id} does not exist")));
    };

    if current.processed {
        tracing::debug!(input_id, "Input already processed (idempotent skip)");
        return Ok(InputGuard::AlreadyProcessed);
    }

    Ok(InputGuard::Fresh(Box::new(current)))
}

/// Roll back and reject with a stable error code.
pub(crate) async fn reject(
    db: &FirestoreDb,
    tx: FirestoreTransaction<'_>,
    code: InputError,
) -> Result<TransitionOutcome, AppError> {
    db.rollback(tx).await;
    Ok(TransitionOutcome::Rejected(code))
}

/// Stage the processed stamp for `input` in the transaction.
pub(crate) fn stage_processed(
    db: &FirestoreDb,
    tx: &mut FirestoreTransaction<'_>,
    input_id: &str,
    input: &Input,
    now_rfc3339: &str,
    error: Option<InputError>,
) -> Result<(), AppError> {
    let mut done = input.clone();
    done.mark_processed(now_rfc3339);
    done.error = error.map(|code| code.code().to_string());
    db.tx_upsert(tx, collections::INPUTS, input_id, &done)
}
