// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Moment redemption and task completion-bonus tests against the
//! Firestore emulator.

use casal_api::db::collections;
use casal_api::models::{Input, MomentTask, TaskStatus};
use casal_api::services::task_bonus::{self, TASK_COMPLETION_BONUS};

mod common;
use common::{enqueue_and_process, paired_user, test_db, unique_id};

const PHONE_A: &str = "11990000001";
const PHONE_B: &str = "11990000002";

async fn seed_couple(db: &casal_api::db::FirestoreDb, balance_a: i64) -> (String, String) {
    let uid_a = unique_id("momA");
    let uid_b = unique_id("momB");
    db.upsert_user(&uid_a, &paired_user("Ana", PHONE_A, balance_a, &uid_b, PHONE_B))
        .await
        .unwrap();
    db.upsert_user(&uid_b, &paired_user("Bruno", PHONE_B, 5, &uid_a, PHONE_A))
        .await
        .unwrap();
    (uid_a, uid_b)
}

fn redeem_input(from: &str, partner: &str, items: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "type": "moment_redeem",
        "fromUid": from,
        "partnerUid": partner,
        "items": items,
        "processed": false
    })
}

#[tokio::test]
async fn redeem_debits_balance_and_creates_tasks() {
    require_emulator!();

    let db = test_db().await;
    let (uid_a, uid_b) = seed_couple(&db, 30).await;

    let input_id = unique_id("in_redeem");
    enqueue_and_process(
        &db,
        &input_id,
        redeem_input(
            &uid_a,
            &uid_b,
            serde_json::json!([
                {"nome": "Jantar a dois", "custoFoguinhos": 10, "categoria": "Romance", "emoji": "🍝"},
                {"nome": "Sessão de cinema", "custoFoguinhos": 8}
            ]),
        ),
    )
    .await;

    let sender = db.get_user(&uid_a).await.unwrap().unwrap();
    // 30 - 18 cost + 10 primeiro_momento reward
    assert_eq!(sender.foguinhos, 22);
    assert_eq!(sender.achievement_stats.moments_redeemed.total, 2);
    assert_eq!(
        sender.achievement_stats.moments_redeemed.por_categoria.get("Romance"),
        Some(&1)
    );
    assert_eq!(
        sender.achievement_stats.moments_redeemed.por_categoria.get("Geral"),
        Some(&1)
    );
    assert_eq!(sender.achievement_stats.total_foguinhos_gastos, 18);
    assert!(sender.conquistas.contains_key("primeiro_momento"));

    let task0: MomentTask = db
        .get_by_id(collections::TAREFAS_MOMENTOS, &format!("{input_id}_0"))
        .await
        .unwrap()
        .expect("first task should exist");
    assert_eq!(task0.status, TaskStatus::Pendente);
    assert_eq!(task0.momento_nome, "Jantar a dois");
    assert_eq!(task0.custo_foguinhos, 10);
    assert_eq!(task0.resgatado_por_uid, uid_a);
    assert_eq!(task0.executado_por_uid, uid_b);

    let task1: MomentTask = db
        .get_by_id(collections::TAREFAS_MOMENTOS, &format!("{input_id}_1"))
        .await
        .unwrap()
        .expect("second task should exist");
    assert_eq!(task1.momento_categoria, "Geral");
    assert_eq!(task1.momento_emoji, "🛍️");
}

#[tokio::test]
async fn redeem_rejects_insufficient_balance() {
    require_emulator!();

    let db = test_db().await;
    let (uid_a, uid_b) = seed_couple(&db, 5).await;

    let input_id = unique_id("in_redeem_poor");
    enqueue_and_process(
        &db,
        &input_id,
        redeem_input(
            &uid_a,
            &uid_b,
            serde_json::json!([{"nome": "Jantar", "custoFoguinhos": 10}]),
        ),
    )
    .await;

    let input: Input = db.get_input(&input_id).await.unwrap().unwrap();
    assert!(!input.processed);
    assert_eq!(input.error.as_deref(), Some("saldo_insuficiente"));

    let sender = db.get_user(&uid_a).await.unwrap().unwrap();
    assert_eq!(sender.foguinhos, 5, "no partial debit");
    let task: Option<MomentTask> = db
        .get_by_id(collections::TAREFAS_MOMENTOS, &format!("{input_id}_0"))
        .await
        .unwrap();
    assert!(task.is_none(), "no task on rejected redemption");
}

#[tokio::test]
async fn redeem_with_only_malformed_items_is_rejected() {
    require_emulator!();

    let db = test_db().await;
    let (uid_a, uid_b) = seed_couple(&db, 30).await;

    let input_id = unique_id("in_redeem_bad");
    enqueue_and_process(
        &db,
        &input_id,
        redeem_input(
            &uid_a,
            &uid_b,
            serde_json::json!([
                {"nome": "", "custoFoguinhos": 10},
                {"nome": "Caro", "custoFoguinhos": 5000}
            ]),
        ),
    )
    .await;

    let input: Input = db.get_input(&input_id).await.unwrap().unwrap();
    assert_eq!(input.error.as_deref(), Some("missing_redeem_info"));
}

#[tokio::test]
async fn redeem_is_idempotent_under_duplicate_delivery() {
    require_emulator!();

    let db = test_db().await;
    let (uid_a, uid_b) = seed_couple(&db, 30).await;

    let input_id = unique_id("in_redeem_dup");
    let input = redeem_input(
        &uid_a,
        &uid_b,
        serde_json::json!([{"nome": "Jantar", "custoFoguinhos": 10}]),
    );
    enqueue_and_process(&db, &input_id, input).await;

    let balance_after_first = db.get_user(&uid_a).await.unwrap().unwrap().foguinhos;

    casal_api::services::dispatcher::process_input(&db, &input_id)
        .await
        .unwrap();

    let sender = db.get_user(&uid_a).await.unwrap().unwrap();
    assert_eq!(sender.foguinhos, balance_after_first, "no double debit");
    assert_eq!(sender.achievement_stats.moments_redeemed.total, 1);
}

#[tokio::test]
async fn completed_task_pays_bonus_exactly_once() {
    require_emulator!();

    let db = test_db().await;
    let (uid_a, uid_b) = seed_couple(&db, 30).await;

    let input_id = unique_id("in_redeem_done");
    enqueue_and_process(
        &db,
        &input_id,
        redeem_input(
            &uid_a,
            &uid_b,
            serde_json::json!([{"nome": "Jantar", "custoFoguinhos": 10}]),
        ),
    )
    .await;

    let task_id = format!("{input_id}_0");
    let balance_before = db.get_user(&uid_a).await.unwrap().unwrap().foguinhos;

    // Partner marks the task as done (as the app client would).
    let mut task: MomentTask = db
        .get_by_id(collections::TAREFAS_MOMENTOS, &task_id)
        .await
        .unwrap()
        .unwrap();
    task.status = TaskStatus::Realizado;
    db.upsert(collections::TAREFAS_MOMENTOS, &task_id, &task)
        .await
        .unwrap();

    task_bonus::on_task_updated(&db, &task_id, Some(TaskStatus::Pendente))
        .await
        .unwrap();

    let redeemer = db.get_user(&uid_a).await.unwrap().unwrap();
    assert_eq!(redeemer.foguinhos, balance_before + TASK_COMPLETION_BONUS);

    let task: MomentTask = db
        .get_by_id(collections::TAREFAS_MOMENTOS, &task_id)
        .await
        .unwrap()
        .unwrap();
    assert!(task.bonus_concedido);
    assert!(task.data_conclusao.is_some());

    // Redelivered event: the in-document guard blocks a second payment.
    task_bonus::on_task_updated(&db, &task_id, Some(TaskStatus::Pendente))
        .await
        .unwrap();
    let redeemer = db.get_user(&uid_a).await.unwrap().unwrap();
    assert_eq!(redeemer.foguinhos, balance_before + TASK_COMPLETION_BONUS);

    // Event with before=Realizado (status rewrite) is a no-op too.
    task_bonus::on_task_updated(&db, &task_id, Some(TaskStatus::Realizado))
        .await
        .unwrap();
    let redeemer = db.get_user(&uid_a).await.unwrap().unwrap();
    assert_eq!(redeemer.foguinhos, balance_before + TASK_COMPLETION_BONUS);
}
