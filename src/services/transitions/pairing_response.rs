// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! `pairing_response`: accept or reject a pending request.
//!
//! This is the authoritative accept path; the reconciler only heals state
//! that reached `pairingRequests` through some other writer. A response to
//! a request that is no longer pending is consumed silently.

use super::{
    read_input_guard, reject, stage_processed, InputGuard, TransitionOutcome,
    MIN_FOGUINHOS_AFTER_PAIRING,
};
use crate::db::{collections, FirestoreDb};
use crate::error::AppError;
use crate::models::input::PairingResponsePayload;
use crate::models::{
    Couple, Input, InputError, PairingRequest, PairingState, RequestStatus, User,
};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};

pub async fn apply(
    db: &FirestoreDb,
    input_id: &str,
    input: &Input,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, AppError> {
    let payload: PairingResponsePayload = input.payload_as().unwrap_or_default();

    let (Some(from_uid), Some(request_id), Some(response)) = (
        input.from_uid.as_deref(),
        payload.request_id.as_deref(),
        payload.response.as_deref(),
    ) else {
        return Ok(TransitionOutcome::Rejected(InputError::MissingResponseInfo));
    };
    if response != "accepted" && response != "rejected" {
        return Ok(TransitionOutcome::Rejected(InputError::MissingResponseInfo));
    }

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

    let Some(mut request) = db
        .tx_get::<PairingRequest>(&tx, collections::PAIRING_REQUESTS, request_id)
        .await?
    else {
        return reject(db, tx, InputError::RequestNotFound).await;
    };

    if request.status != RequestStatus::Pending {
        // Stale or duplicate response; consume the input without error.
        stage_processed(db, &mut tx, input_id, &current, &now_str, None)?;
        db.commit(tx).await?;
        return Ok(TransitionOutcome::Noop);
    }

    if response == "accepted" {
        let sender_uid = request.sender_uid.clone();

        let (sender, receiver) = futures_util::try_join!(
            db.tx_get::<User>(&tx, collections::USUARIOS, &sender_uid),
            db.tx_get::<User>(&tx, collections::USUARIOS, from_uid),
        )?;
        let (Some(mut sender), Some(mut receiver)) = (sender, receiver) else {
            return reject(db, tx, InputError::UserNotFound).await;
        };

        let receiver_phone = request
            .receiver_phone
            .clone()
            .or_else(|| receiver.telefone.clone());
        let sender_phone = request
            .sender_phone
            .clone()
            .or_else(|| sender.telefone.clone());

        sender.pareado_com = receiver_phone.clone();
        sender.pareado_uid = Some(from_uid.to_string());
        sender.foguinhos = sender.foguinhos.max(MIN_FOGUINHOS_AFTER_PAIRING);
        db.tx_upsert(&mut tx, collections::USUARIOS, &sender_uid, &sender)?;

        receiver.pareado_com = sender_phone.clone();
        receiver.pareado_uid = Some(sender_uid.clone());
        receiver.foguinhos = receiver.foguinhos.max(MIN_FOGUINHOS_AFTER_PAIRING);
        db.tx_upsert(&mut tx, collections::USUARIOS, from_uid, &receiver)?;

        if let (Some(sender_phone), Some(receiver_phone)) =
            (sender_phone.as_deref(), receiver_phone.as_deref())
        {
            if let Some((couple_id, couple)) = Couple::link(
                &sender_uid,
                sender_phone,
                from_uid,
                receiver_phone,
                &now_str,
            ) {
                db.tx_upsert(&mut tx, collections::PAREAMENTOS, &couple_id, &couple)?;
            }
        } else {
            tracing::warn!(request_id, "Accepted pairing without resolvable phones");
        }

        request.status = RequestStatus::Accepted;
        request.receiver_uid = Some(from_uid.to_string());
        request.receiver_phone = receiver_phone;
        request.sender_phone = sender_phone;
        db.tx_upsert(&mut tx, collections::PAIRING_REQUESTS, request_id, &request)?;

        stage_processed(db, &mut tx, input_id, &current, &now_str, None)?;
        db.commit(tx).await?;

        tracing::info!(input_id, request_id, "Pairing accepted");
        return Ok(TransitionOutcome::Applied);
    }

    // rejected: clear the sender's pending marker and close the request.
    let sender_uid = request.sender_uid.clone();
    if let Some(mut sender) = db
        .tx_get::<User>(&tx, collections::USUARIOS, &sender_uid)
        .await?
    {
        let expected =
            PairingState::pending_marker(request.receiver_phone.as_deref().unwrap_or(""));
        if sender.pareado_com.as_deref() == Some(expected.as_str()) {
            sender.pareado_com = None;
            db.tx_upsert(&mut tx, collections::USUARIOS, &sender_uid, &sender)?;
        }
    }

    request.status = RequestStatus::Rejected;
    db.tx_upsert(&mut tx, collections::PAIRING_REQUESTS, request_id, &request)?;

    stage_processed(db, &mut tx, input_id, &current, &now_str, None)?;
    db.commit(tx).await?;

    tracing::info!(input_id, request_id, "Pairing rejected");
    Ok(TransitionOutcome::Applied)
}
