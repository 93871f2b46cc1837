// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! `pairing_cancel`: withdraw a pending request.

use super::{read_input_guard, stage_processed, InputGuard, TransitionOutcome};
use crate::db::{collections, FirestoreDb};
use crate::error::AppError;
use crate::models::input::PairingCancelPayload;
use crate::models::{
    Input, InputError, PairingRequest, PairingState, RequestStatus, User,
};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};

pub async fn apply(
    db: &FirestoreDb,
    input_id: &str,
    input: &Input,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, AppError> {
    let payload: PairingCancelPayload = input.payload_as().unwrap_or_default();

    let Some(from_uid) = input.from_uid.as_deref() else {
        return Ok(TransitionOutcome::Rejected(InputError::MissingCancelInfo));
    };
    if payload.request_id.is_none()
        && payload.partner_uid.is_none()
        && payload.partner_phone.is_none()
    {
        return Ok(TransitionOutcome::Rejected(InputError::MissingCancelInfo));
    }

    // Resolve the request id from the partner when not given directly.
    let request_id = match payload.request_id.clone() {
        Some(id) => Some(id),
        None => {
            let mut partner_uid = payload.partner_uid.clone();
            if partner_uid.is_none() {
                if let Some(phone) = payload.partner_phone.as_deref() {
                    partner_uid = db.find_user_by_phone(phone).await?.map(|(uid, _)| uid);
                }
            }
            partner_uid.map(|uid| PairingRequest::doc_id(from_uid, &uid))
        }
    };

    let now_str = format_utc_rfc3339(now);
    let mut tx = db.begin().await?;

    let current = match read_input_guard(db, &tx, input_id).await {
        Ok(InputGuard::Fresh(input)) => *input,
        Ok(InputGuard::AlreadyProcessed) => {
            db.rollback(tx).await;
            return Ok(TransitionOutcome::AlreadyProcessed);
        }
        Err(e) => {
            db.rollback(tx).await;
            return Err(e);
        }
    };

    let Some(request_id) = request_id else {
        // Nothing to cancel; consume the input with a diagnostic code.
        stage_processed(
            db,
            &mut tx,
            input_id,
            &current,
            &now_str,
            Some(InputError::RequestNotFound),
        )?;
        db.commit(tx).await?;
        return Ok(TransitionOutcome::Skipped(InputError::RequestNotFound));
    };

    let request: Option<PairingRequest> = db
        .tx_get(&tx, collections::PAIRING_REQUESTS, &request_id)
        .await?;

    match request {
        Some(request) if request.status == RequestStatus::Pending => {
            db.tx_delete(&mut tx, collections::PAIRING_REQUESTS, &request_id)?;

            // Clear the sender's pending marker if it still matches.
            if let Some(mut sender) = db
                .tx_get::<User>(&tx, collections::USUARIOS, &request.sender_uid)
                .await?
            {
                let expected =
                    PairingState::pending_marker(request.receiver_phone.as_deref().unwrap_or(""));
                if sender.pareado_com.as_deref() == Some(expected.as_str()) {
                    sender.pareado_com = None;
                    db.tx_upsert(&mut tx, collections::USUARIOS, &request.sender_uid, &sender)?;
                }
            }

            stage_processed(db, &mut tx, input_id, &current, &now_str, None)?;
            db.commit(tx).await?;

            tracing::info!(input_id, request_id = %request_id, "Pairing request cancelled");
            Ok(TransitionOutcome::Applied)
        }
        _ => {
            // Missing or already terminal; nothing to undo.
            stage_processed(db, &mut tx, input_id, &current, &now_str, None)?;
            db.commit(tx).await?;
            Ok(TransitionOutcome::Noop)
        }
    }
}
