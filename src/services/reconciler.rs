// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pairing-request reconciler.
//!
//! Reacts to direct status changes on `pairingRequests` documents, a
//! secondary consistency mechanism for writes that bypass the input queue.
//! The `pairing_response` handler is the authoritative accept path; this
//! module first checks whether user records already reflect the request's
//! terminal state and exits without writing when they do, so both paths
//! firing for the same transition never double-applies effects.

use crate::db::{collections, FirestoreDb};
use crate::error::AppError;
use crate::models::{Couple, PairingRequest, PairingState, RequestStatus, User};
use crate::services::transitions::MIN_FOGUINHOS_AFTER_PAIRING;
use crate::time_utils::format_utc_rfc3339;
use chrono::Utc;

/// Who stamped a request as reconciled (diagnostic field).
const PROCESSED_BY: &str = "casal-api.reconcile_pairing_request";

/// Handle an update event on `pairingRequests/{request_id}`.
///
/// `before_status` is the status prior to the update, used for the
/// first-transition-only guard; re-delivery of an already-terminal state is
/// a no-op.
pub async fn on_request_updated(
    db: &FirestoreDb,
    request_id: &str,
    before_status: Option<RequestStatus>,
) -> Result<(), AppError> {
    let Some(request) = db
        .get_by_id::<PairingRequest>(collections::PAIRING_REQUESTS, request_id)
        .await?
    else {
        tracing::debug!(request_id, "Request event without a document");
        return Ok(());
    };

    match request.status {
        RequestStatus::Accepted => {
            if before_status == Some(RequestStatus::Accepted) {
                tracing::debug!(request_id, "Already accepted; nothing to reconcile");
                return Ok(());
            }
            reconcile_accepted(db, request_id, &request).await
        }
        RequestStatus::Rejected => {
            if before_status == Some(RequestStatus::Rejected) {
                tracing::debug!(request_id, "Already rejected; nothing to reconcile");
                return Ok(());
            }
            reconcile_rejected(db, request_id, &request).await
        }
        RequestStatus::Pending => Ok(()),
    }
}

/// Whether both user records already reflect the accepted pairing.
fn users_match_accepted(
    sender: &User,
    receiver: &User,
    sender_uid: &str,
    receiver_uid: &str,
) -> bool {
    sender.pareado_uid.as_deref() == Some(receiver_uid)
        && receiver.pareado_uid.as_deref() == Some(sender_uid)
        && sender.foguinhos >= MIN_FOGUINHOS_AFTER_PAIRING
        && receiver.foguinhos >= MIN_FOGUINHOS_AFTER_PAIRING
}

async fn reconcile_accepted(
    db: &FirestoreDb,
    request_id: &str,
    request: &PairingRequest,
) -> Result<(), AppError> {
    let sender_uid = request.sender_uid.as_str();
    let Some(receiver_uid) = request.receiver_uid.as_deref() else {
        tracing::error!(request_id, "Accepted request without receiver uid");
        return Ok(());
    };

    let mut tx = db.begin().await?;

    let (sender, receiver) = futures_util::try_join!(
        db.tx_get::<User>(&tx, collections::USUARIOS, sender_uid),
        db.tx_get::<User>(&tx, collections::USUARIOS, receiver_uid),
    )?;
    let (Some(mut sender), Some(mut receiver)) = (sender, receiver) else {
        db.rollback(tx).await;
        return Err(AppError::NotFound(format!(
            "pairing {request_id}: user record missing"
        )));
    };

    if users_match_accepted(&sender, &receiver, sender_uid, receiver_uid) {
        db.rollback(tx).await;
        tracing::debug!(request_id, "Users already consistent; reconcile no-op");
        return Ok(());
    }

    let now_str = format_utc_rfc3339(Utc::now());
    let receiver_phone = request
        .receiver_phone
        .clone()
        .or_else(|| receiver.telefone.clone());
    let sender_phone = request
        .sender_phone
        .clone()
        .or_else(|| sender.telefone.clone());

    sender.pareado_com = receiver_phone.clone();
    sender.pareado_uid = Some(receiver_uid.to_string());
    sender.foguinhos = sender.foguinhos.max(MIN_FOGUINHOS_AFTER_PAIRING);
    db.tx_upsert(&mut tx, collections::USUARIOS, sender_uid, &sender)?;

    receiver.pareado_com = sender_phone.clone();
    receiver.pareado_uid = Some(sender_uid.to_string());
    receiver.foguinhos = receiver.foguinhos.max(MIN_FOGUINHOS_AFTER_PAIRING);
    db.tx_upsert(&mut tx, collections::USUARIOS, receiver_uid, &receiver)?;

    if let (Some(sender_phone), Some(receiver_phone)) =
        (sender_phone.as_deref(), receiver_phone.as_deref())
    {
        if let Some((couple_id, couple)) =
            Couple::link(sender_uid, sender_phone, receiver_uid, receiver_phone, &now_str)
        {
            db.tx_upsert(&mut tx, collections::PAREAMENTOS, &couple_id, &couple)?;
        }
    }

    let mut stamped = request.clone();
    stamped.processed_by = Some(PROCESSED_BY.to_string());
    stamped.processed_at = Some(now_str);
    db.tx_upsert(&mut tx, collections::PAIRING_REQUESTS, request_id, &stamped)?;

    db.commit(tx).await?;
    tracing::info!(request_id, "Accepted pairing reconciled");
    Ok(())
}

async fn reconcile_rejected(
    db: &FirestoreDb,
    request_id: &str,
    request: &PairingRequest,
) -> Result<(), AppError> {
    let sender_uid = request.sender_uid.as_str();

    let mut tx = db.begin().await?;

    let Some(mut sender) = db
        .tx_get::<User>(&tx, collections::USUARIOS, sender_uid)
        .await?
    else {
        db.rollback(tx).await;
        return Err(AppError::NotFound(format!(
            "pairing {request_id}: sender {sender_uid} missing"
        )));
    };

    let expected = PairingState::pending_marker(request.receiver_phone.as_deref().unwrap_or(""));
    if sender.pareado_com.as_deref() == Some(expected.as_str()) {
        sender.pareado_com = None;
        sender.pareado_uid = None;
        db.tx_upsert(&mut tx, collections::USUARIOS, sender_uid, &sender)?;
    }

    let mut stamped = request.clone();
    stamped.processed_by = Some(PROCESSED_BY.to_string());
    stamped.processed_at = Some(format_utc_rfc3339(Utc::now()));
    db.tx_upsert(&mut tx, collections::PAIRING_REQUESTS, request_id, &stamped)?;

    db.commit(tx).await?;
    tracing::info!(request_id, "Rejected pairing reconciled");
    Ok(())
}
