// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! `moment_redeem`: spend foguinhos on reward items, creating one pending
//! task per item for the partner to fulfill.

use super::{read_input_guard, reject, stage_processed, InputGuard, TransitionOutcome};
use crate::achievements::{self, AchievementTrigger};
use crate::db::{collections, FirestoreDb};
use crate::error::AppError;
use crate::models::input::MomentRedeemPayload;
use crate::models::moment::sanitize_moment_items;
use crate::models::{
    are_users_paired, Couple, Input, InputError, MomentTask, Notification, TaskStatus, User,
};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};

pub async fn apply(
    db: &FirestoreDb,
    input_id: &str,
    input: &Input,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, AppError> {
    let payload: MomentRedeemPayload = input.payload_as().unwrap_or_default();
    let items = sanitize_moment_items(&payload.items);

    let (Some(from_uid), Some(partner_uid)) =
        (input.from_uid.as_deref(), payload.partner_uid.as_deref())
    else {
        return Ok(TransitionOutcome::Rejected(InputError::MissingRedeemInfo));
    };
    if items.is_empty() {
        return Ok(TransitionOutcome::Rejected(InputError::MissingRedeemInfo));
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

    let (sender, partner) = futures_util::try_join!(
        db.tx_get::<User>(&tx, collections::USUARIOS, from_uid),
        db.tx_get::<User>(&tx, collections::USUARIOS, partner_uid),
    )?;
    let (Some(mut sender), Some(partner)) = (sender, partner) else {
        return reject(db, tx, InputError::UserNotFound).await;
    };

    if !are_users_paired(&sender, &partner, from_uid, partner_uid) {
        return reject(db, tx, InputError::UsersNotPaired).await;
    }

    let total_cost: i64 = items.iter().map(|item| item.custo_foguinhos).sum();
    if total_cost <= 0 || total_cost > sender.foguinhos {
        return reject(db, tx, InputError::InsufficientBalance).await;
    }

    sender.foguinhos -= total_cost;

    let pareamento_id = payload.pareamento_id.clone().unwrap_or_else(|| {
        Couple::friendly_id(
            sender.telefone.as_deref().unwrap_or(""),
            partner.telefone.as_deref().unwrap_or(""),
        )
    });

    for (idx, item) in items.iter().enumerate() {
        let task = MomentTask {
            momento_nome: item.nome.clone(),
            momento_emoji: item.emoji_or_default().to_string(),
            momento_categoria: item.categoria_or_default().to_string(),
            custo_foguinhos: item.custo_foguinhos,
            status: TaskStatus::Pendente,
            data_resgate: now_str.clone(),
            data_conclusao: None,
            id_pareamento: pareamento_id.clone(),
            resgatado_por_uid: from_uid.to_string(),
            resgatado_por_nome: sender.nome.clone().unwrap_or_default(),
            executado_por_uid: partner_uid.to_string(),
            executado_por_nome: partner.nome.clone().unwrap_or_default(),
            bonus_concedido: false,
        };
        db.tx_upsert(
            &mut tx,
            collections::TAREFAS_MOMENTOS,
            &format!("{input_id}_{idx}"),
            &task,
        )?;
    }

    let resumo: Vec<&str> = items.iter().take(2).map(|item| item.nome.as_str()).collect();
    let plural = if items.len() > 1 { "s" } else { "" };
    let notification = Notification::new(
        partner_uid,
        "Momento resgatado!",
        format!(
            "{} resgatou {} momento{plural}: {}.",
            sender.display_name(),
            items.len(),
            resumo.join(", ")
        ),
        "fa-shopping-bag",
        now,
    );
    db.tx_upsert(
        &mut tx,
        collections::NOTIFICACOES,
        &format!("{input_id}_resgate"),
        &notification,
    )?;

    let stats_before = sender.achievement_stats.clone();
    let categories: Vec<String> = items
        .iter()
        .map(|item| item.categoria_or_default().to_string())
        .collect();
    sender
        .achievement_stats
        .record_redeem(&categories, total_cost);

    let evaluation = achievements::evaluate(
        AchievementTrigger::MomentRedeem,
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
        items = items.len(),
        total_cost,
        "Moment redemption processed"
    );
    Ok(TransitionOutcome::Applied)
}
