// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! `daily_check_in`: once-a-day streak tick that credits the partner.
//!
//! The second check-in on the same UTC calendar day is consumed with the
//! `checkin_duplicate` code and changes nothing; at-least-once delivery of
//! the same input is covered separately by the `processed` guard.

use super::{
    read_input_guard, reject, stage_processed, InputGuard, TransitionOutcome,
    DAILY_CHECK_IN_REWARD,
};
use crate::achievements::{self, AchievementTrigger};
use crate::db::{collections, FirestoreDb};
use crate::error::AppError;
use crate::models::input::DailyCheckInPayload;
use crate::models::{are_users_paired, Input, InputError, Notification, User};
use crate::time_utils::{format_utc_rfc3339, is_same_calendar_day, parse_rfc3339};
use chrono::{DateTime, Utc};

pub async fn apply(
    db: &FirestoreDb,
    input_id: &str,
    input: &Input,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, AppError> {
    let payload: DailyCheckInPayload = input.payload_as().unwrap_or_default();

    let (Some(from_uid), Some(partner_uid)) =
        (input.from_uid.as_deref(), payload.partner_uid.as_deref())
    else {
        return Ok(TransitionOutcome::Rejected(InputError::MissingCheckinInfo));
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

    let (sender, partner) = futures_util::try_join!(
        db.tx_get::<User>(&tx, collections::USUARIOS, from_uid),
        db.tx_get::<User>(&tx, collections::USUARIOS, partner_uid),
    )?;
    let (Some(mut sender), Some(mut partner)) = (sender, partner) else {
        return reject(db, tx, InputError::UserNotFound).await;
    };

    if !are_users_paired(&sender, &partner, from_uid, partner_uid) {
        return reject(db, tx, InputError::UsersNotPaired).await;
    }

    let previous = sender.last_check_in_date.as_deref().and_then(parse_rfc3339);
    if previous.is_some_and(|prev| is_same_calendar_day(prev, now)) {
        stage_processed(
            db,
            &mut tx,
            input_id,
            &current,
            &now_str,
            Some(InputError::CheckinDuplicate),
        )?;
        db.commit(tx).await?;
        return Ok(TransitionOutcome::Skipped(InputError::CheckinDuplicate));
    }

    let stats_before = sender.achievement_stats.clone();
    sender.achievement_stats.record_check_in(previous, now);
    sender.last_check_in_date = Some(now_str.clone());

    partner.foguinhos += DAILY_CHECK_IN_REWARD;
    db.tx_upsert(&mut tx, collections::USUARIOS, partner_uid, &partner)?;

    let notification = Notification::new(
        partner_uid,
        "Você ganhou um presente!",
        format!(
            "{} te presenteou com {DAILY_CHECK_IN_REWARD} foguinho 🔥.",
            sender.display_name()
        ),
        "fa-gift",
        now,
    );
    db.tx_upsert(
        &mut tx,
        collections::NOTIFICACOES,
        &format!("{input_id}_checkin"),
        &notification,
    )?;

    // Achievements commit (or abort) with this same transaction.
    let evaluation = achievements::evaluate(
        AchievementTrigger::DailyCheckIn,
        &stats_before,
        &sender.achievement_stats,
        &sender.conquistas,
        from_uid,
        now,
    );
    sender.foguinhos += evaluation.reward_total;
    for (id, unlocked) in &evaluation.unlocked {
        sender.conquistas.insert(id.clone(), unlocked.clone());
    }
    for (idx, notification) in evaluation.notifications.iter().enumerate() {
        db.tx_upsert(
            &mut tx,
            collections::NOTIFICACOES,
            &format!("{input_id}_conquista_{idx}"),
            notification,
        )?;
    }
    db.tx_upsert(&mut tx, collections::USUARIOS, from_uid, &sender)?;

    stage_processed(db, &mut tx, input_id, &current, &now_str, None)?;
    db.commit(tx).await?;

    tracing::info!(
        input_id,
        from_uid,
        partner_uid,
        streak = sender.achievement_stats.current_daily_streak,
        unlocked = evaluation.unlocked.len(),
        "Daily check-in processed"
    );
    Ok(TransitionOutcome::Applied)
}
