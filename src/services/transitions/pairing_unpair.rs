// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! `pairing_unpair`: dissolve a couple and reset both members.
//!
//! Partner lookup failures are tolerated: the sender's own reset always
//! applies, and the partner-side reset is skipped when their record cannot
//! be resolved.

use super::{read_input_guard, reject, stage_processed, InputGuard, TransitionOutcome};
use crate::db::{collections, FirestoreDb};
use crate::error::AppError;
use crate::models::input::PairingUnpairPayload;
use crate::models::{Couple, Input, InputError, PairingRequest, User};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};

pub async fn apply(
    db: &FirestoreDb,
    input_id: &str,
    input: &Input,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, AppError> {
    let payload: PairingUnpairPayload = input.payload_as().unwrap_or_default();

    let Some(from_uid) = input.from_uid.as_deref() else {
        return Ok(TransitionOutcome::Rejected(InputError::MissingUnpairInfo));
    };
    if payload.partner_uid.is_none() && payload.partner_phone.is_none() {
        return Ok(TransitionOutcome::Rejected(InputError::MissingUnpairInfo));
    }

    // Resolve the partner uid from their phone when not given directly.
    let mut partner_uid = payload.partner_uid.clone();
    let mut partner_phone = payload.partner_phone.clone();
    if partner_uid.is_none() {
        if let Some(phone) = partner_phone.as_deref() {
            if let Some((uid, partner)) = db.find_user_by_phone(phone).await? {
                partner_phone = partner.telefone.clone().or(partner_phone);
                partner_uid = Some(uid);
            }
        }
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

    let Some(mut sender) = db
        .tx_get::<User>(&tx, collections::USUARIOS, from_uid)
        .await?
    else {
        return reject(db, tx, InputError::SenderNotFound).await;
    };
    let sender_phone = sender.telefone.clone();

    sender.reset_pairing();
    db.tx_upsert(&mut tx, collections::USUARIOS, from_uid, &sender)?;

    let mut partner_phone_from_record = None;
    if let Some(partner_uid) = partner_uid.as_deref() {
        if let Some(mut partner) = db
            .tx_get::<User>(&tx, collections::USUARIOS, partner_uid)
            .await?
        {
            partner_phone_from_record = partner.telefone.clone();
            partner.reset_pairing();
            db.tx_upsert(&mut tx, collections::USUARIOS, partner_uid, &partner)?;
        } else {
            tracing::warn!(input_id, partner_uid, "Unpair partner record missing");
        }
    }

    // Remove the couple record when both phones are resolvable.
    let partner_phone = partner_phone.or(partner_phone_from_record);
    if let (Some(sender_phone), Some(partner_phone)) =
        (sender_phone.as_deref(), partner_phone.as_deref())
    {
        if let Some(couple_id) = Couple::doc_id(sender_phone, partner_phone) {
            db.tx_delete(&mut tx, collections::PAREAMENTOS, &couple_id)?;
        }
    }

    // Remove any request between the pair.
    if let Some(partner_uid) = partner_uid.as_deref() {
        let request_id = PairingRequest::doc_id(from_uid, partner_uid);
        db.tx_delete(&mut tx, collections::PAIRING_REQUESTS, &request_id)?;
    }

    stage_processed(db, &mut tx, input_id, &current, &now_str, None)?;
    db.commit(tx).await?;

    tracing::info!(input_id, from_uid, "Unpair processed");
    Ok(TransitionOutcome::Applied)
}
