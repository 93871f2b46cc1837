// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! `pairing_request`: open a pending request towards another user.
//!
//! Validation (receiver lookup, already-paired guards) runs on plain reads
//! before the transaction; the transaction itself re-checks the input guard
//! and the existing request so duplicate deliveries collapse to no-ops.

use super::{read_input_guard, stage_processed, InputGuard, TransitionOutcome};
use crate::db::{collections, FirestoreDb};
use crate::error::AppError;
use crate::models::input::PairingRequestPayload;
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
    let payload: PairingRequestPayload = input.payload_as().unwrap_or_default();

    let Some(from_uid) = input.from_uid.as_deref() else {
        return Ok(TransitionOutcome::Rejected(InputError::MissingPairingInfo));
    };
    if payload.to_uid.is_none() && payload.to_phone.is_none() {
        return Ok(TransitionOutcome::Rejected(InputError::MissingPairingInfo));
    }

    // Resolve the receiver: by uid if given, otherwise by phone lookup.
    let mut to_uid = payload.to_uid.clone();
    let mut to_phone = payload.to_phone.clone();
    let mut to_name = payload.to_name.clone();
    let mut receiver: Option<User> = None;

    if to_uid.is_none() {
        if let Some(phone) = to_phone.as_deref() {
            if let Some((uid, found)) = db.find_user_by_phone(phone).await? {
                to_phone = found.telefone.clone().or(to_phone);
                to_name = found.nome.clone().or(to_name);
                to_uid = Some(uid);
                receiver = Some(found);
            }
        }
    }
    let Some(to_uid) = to_uid else {
        return Ok(TransitionOutcome::Rejected(InputError::ReceiverNotFound));
    };

    let Some(sender) = db.get_user(from_uid).await? else {
        return Ok(TransitionOutcome::Rejected(InputError::SenderNotFound));
    };
    if let PairingState::Paired { uid: Some(uid), .. } = PairingState::of(&sender) {
        if uid != to_uid {
            return Ok(TransitionOutcome::Rejected(InputError::SenderAlreadyPaired));
        }
    }

    let receiver = match receiver {
        Some(receiver) => receiver,
        None => match db.get_user(&to_uid).await? {
            Some(receiver) => {
                to_phone = receiver.telefone.clone().or(to_phone);
                to_name = receiver.nome.clone().or(to_name);
                receiver
            }
            None => return Ok(TransitionOutcome::Rejected(InputError::ReceiverNotFound)),
        },
    };
    if let PairingState::Paired { uid: Some(uid), .. } = PairingState::of(&receiver) {
        if uid != from_uid {
            return Ok(TransitionOutcome::Rejected(InputError::ReceiverAlreadyPaired));
        }
    }

    let request_id = PairingRequest::doc_id(from_uid, &to_uid);
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

    let existing: Option<PairingRequest> = db
        .tx_get(&tx, collections::PAIRING_REQUESTS, &request_id)
        .await?;
    if matches!(&existing, Some(req) if req.status == RequestStatus::Pending) {
        // A pending request for this pair already exists; consume the input.
        stage_processed(db, &mut tx, input_id, &current, &now_str, None)?;
        db.commit(tx).await?;
        return Ok(TransitionOutcome::Noop);
    }

    let request = PairingRequest {
        sender_uid: from_uid.to_string(),
        sender_name: payload.from_name.clone(),
        sender_phone: payload.from_phone.clone(),
        receiver_uid: Some(to_uid.clone()),
        receiver_phone: to_phone.clone(),
        receiver_name: to_name,
        status: RequestStatus::Pending,
        timestamp: Some(now_str.clone()),
        processed_by: None,
        processed_at: None,
    };
    db.tx_upsert(&mut tx, collections::PAIRING_REQUESTS, &request_id, &request)?;

    // Mark the sender's outgoing state so cancellations and rejections can
    // clean it up later. Skip when the sender is already paired.
    if let Some(phone) = to_phone.as_deref() {
        let marker = PairingState::pending_marker(phone);
        if let Some(mut sender) = db
            .tx_get::<User>(&tx, collections::USUARIOS, from_uid)
            .await?
        {
            let state = PairingState::of(&sender);
            let already_marked =
                matches!(&state, PairingState::PendingOutgoing { phone: p } if *p == phone);
            if !matches!(state, PairingState::Paired { .. }) && !already_marked {
                sender.pareado_com = Some(marker);
                db.tx_upsert(&mut tx, collections::USUARIOS, from_uid, &sender)?;
            }
        }
    }

    stage_processed(db, &mut tx, input_id, &current, &now_str, None)?;
    db.commit(tx).await?;

    tracing::info!(input_id, request_id = %request_id, "Pairing request processed");
    Ok(TransitionOutcome::Applied)
}
