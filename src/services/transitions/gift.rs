// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! `gift`: transfer foguinhos to a paired partner.

use super::{read_input_guard, reject, stage_processed, InputGuard, TransitionOutcome};
use crate::db::{collections, FirestoreDb};
use crate::error::AppError;
use crate::models::input::{coerce_int, GiftPayload};
use crate::models::{are_users_paired, Input, InputError, Notification, User};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};

pub async fn apply(
    db: &FirestoreDb,
    input_id: &str,
    input: &Input,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, AppError> {
    let payload: GiftPayload = input.payload_as().unwrap_or_default();

    let (Some(from_uid), Some(to_uid)) = (input.from_uid.as_deref(), payload.to_uid.as_deref())
    else {
        return Ok(TransitionOutcome::Rejected(InputError::MissingUids));
    };

    let amount = match coerce_int(payload.amount.as_ref()) {
        Some(amount) if (1..=super::MAX_GIFT_AMOUNT).contains(&amount) => amount,
        _ => return Ok(TransitionOutcome::Rejected(InputError::InvalidAmount)),
    };

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

    let (sender, receiver) = futures_util::try_join!(
        db.tx_get::<User>(&tx, collections::USUARIOS, from_uid),
        db.tx_get::<User>(&tx, collections::USUARIOS, to_uid),
    )?;
    let (Some(sender), Some(mut receiver)) = (sender, receiver) else {
        db.rollback(tx).await;
        return Err(AppError::NotFound(format!(
            "gift between {from_uid} and {to_uid}: user record missing"
        )));
    };

    if !are_users_paired(&sender, &receiver, from_uid, to_uid) {
        return reject(db, tx, InputError::UsersNotPaired).await;
    }

    receiver.foguinhos += amount;
    db.tx_upsert(&mut tx, collections::USUARIOS, to_uid, &receiver)?;

    let from_name = payload
        .from_name
        .as_deref()
        .or(sender.nome.as_deref())
        .unwrap_or("Seu Parceiro");
    let notification = Notification::new(
        to_uid,
        "Você ganhou um presente!",
        format!("{from_name} te presenteou com {amount} foguinho(s)!"),
        "fa-gift",
        now,
    );
    db.tx_upsert(
        &mut tx,
        collections::NOTIFICACOES,
        &format!("{input_id}_gift"),
        &notification,
    )?;

    stage_processed(db, &mut tx, input_id, &current, &format_utc_rfc3339(now), None)?;
    db.commit(tx).await?;

    tracing::info!(input_id, from_uid, to_uid, amount, "Gift processed");
    Ok(TransitionOutcome::Applied)
}
