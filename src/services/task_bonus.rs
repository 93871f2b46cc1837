// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Completion bonus for fulfilled moment tasks.
//!
//! Reacts to `tarefasMomentos` update events: the first transition into
//! `Realizado` pays the redeemer a one-time bonus. The `bonusConcedido`
//! flag, checked and set inside the transaction, keeps redelivered or
//! repeated status flips from paying twice.

use crate::db::{collections, FirestoreDb};
use crate::error::AppError;
use crate::models::{MomentTask, Notification, TaskStatus, User};
use crate::time_utils::format_utc_rfc3339;
use chrono::Utc;

/// Foguinhos paid to the redeemer when the partner completes a task.
pub const TASK_COMPLETION_BONUS: i64 = 5;

/// Handle an update event on `tarefasMomentos/{task_id}`.
pub async fn on_task_updated(
    db: &FirestoreDb,
    task_id: &str,
    before_status: Option<TaskStatus>,
) -> Result<(), AppError> {
    if before_status == Some(TaskStatus::Realizado) {
        tracing::debug!(task_id, "Task was already completed; no bonus");
        return Ok(());
    }

    let now = Utc::now();
    let now_str = format_utc_rfc3339(now);

    let mut tx = db.begin().await?;

    let Some(mut task) = db
        .tx_get::<MomentTask>(&tx, collections::TAREFAS_MOMENTOS, task_id)
        .await?
    else {
        db.rollback(tx).await;
        tracing::debug!(task_id, "Task event without a document");
        return Ok(());
    };

    if task.status != TaskStatus::Realizado || task.bonus_concedido {
        db.rollback(tx).await;
        return Ok(());
    }

    let redeemer_uid = task.resgatado_por_uid.clone();
    let Some(mut redeemer) = db
        .tx_get::<User>(&tx, collections::USUARIOS, &redeemer_uid)
        .await?
    else {
        db.rollback(tx).await;
        return Err(AppError::NotFound(format!(
            "task {task_id}: redeemer {redeemer_uid} missing"
        )));
    };

    redeemer.foguinhos += TASK_COMPLETION_BONUS;
    db.tx_upsert(&mut tx, collections::USUARIOS, &redeemer_uid, &redeemer)?;

    task.bonus_concedido = true;
    if task.data_conclusao.is_none() {
        task.data_conclusao = Some(now_str);
    }
    db.tx_upsert(&mut tx, collections::TAREFAS_MOMENTOS, task_id, &task)?;

    let executor = if task.executado_por_nome.is_empty() {
        "Seu parceiro".to_string()
    } else {
        task.executado_por_nome.clone()
    };
    let notification = Notification::new(
        &redeemer_uid,
        "Momento concluído!",
        format!(
            "{executor} realizou \"{}\"! Você ganhou {TASK_COMPLETION_BONUS} foguinhos de bônus.",
            task.momento_nome
        ),
        "fa-circle-check",
        now,
    );
    db.tx_upsert(
        &mut tx,
        collections::NOTIFICACOES,
        &format!("{task_id}_bonus"),
        &notification,
    )?;

    db.commit(tx).await?;

    tracing::info!(task_id, redeemer_uid = %redeemer_uid, "Task completion bonus paid");
    Ok(())
}
