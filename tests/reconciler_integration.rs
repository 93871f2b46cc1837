// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reconciler tests: status changes that reach `pairingRequests` outside
//! the input queue must still converge user records.

use casal_api::db::collections;
use casal_api::models::{Couple, PairingRequest, PairingState, RequestStatus};
use casal_api::services::reconciler;
use casal_api::services::transitions::MIN_FOGUINHOS_AFTER_PAIRING;

mod common;
use common::{test_db, test_user, unique_id};

const PHONE_A: &str = "11990000001";
const PHONE_B: &str = "11990000002";

fn pending_request(uid_a: &str, uid_b: &str) -> PairingRequest {
    PairingRequest {
        sender_uid: uid_a.to_string(),
        sender_name: Some("Ana".to_string()),
        sender_phone: Some(PHONE_A.to_string()),
        receiver_uid: Some(uid_b.to_string()),
        receiver_phone: Some(PHONE_B.to_string()),
        receiver_name: Some("Bruno".to_string()),
        status: RequestStatus::Pending,
        timestamp: None,
        processed_by: None,
        processed_at: None,
    }
}

#[tokio::test]
async fn direct_accept_is_healed_into_user_records() {
    require_emulator!();

    let db = test_db().await;
    let uid_a = unique_id("recA");
    let uid_b = unique_id("recB");
    db.upsert_user(&uid_a, &test_user("Ana", PHONE_A, 0)).await.unwrap();
    db.upsert_user(&uid_b, &test_user("Bruno", PHONE_B, 2)).await.unwrap();

    let request_id = PairingRequest::doc_id(&uid_a, &uid_b);
    let mut request = pending_request(&uid_a, &uid_b);
    request.status = RequestStatus::Accepted;
    db.upsert(collections::PAIRING_REQUESTS, &request_id, &request)
        .await
        .unwrap();

    // Status flipped straight to accepted by some other writer.
    reconciler::on_request_updated(&db, &request_id, Some(RequestStatus::Pending))
        .await
        .unwrap();

    let user_a = db.get_user(&uid_a).await.unwrap().unwrap();
    let user_b = db.get_user(&uid_b).await.unwrap().unwrap();
    assert_eq!(user_a.pareado_uid.as_deref(), Some(uid_b.as_str()));
    assert_eq!(user_b.pareado_uid.as_deref(), Some(uid_a.as_str()));
    assert!(user_a.foguinhos >= MIN_FOGUINHOS_AFTER_PAIRING);
    assert!(user_b.foguinhos >= MIN_FOGUINHOS_AFTER_PAIRING);

    let couple_id = Couple::doc_id(PHONE_A, PHONE_B).unwrap();
    let couple: Option<Couple> = db
        .get_by_id(collections::PAREAMENTOS, &couple_id)
        .await
        .unwrap();
    assert!(couple.is_some(), "couple record should be created");

    let stamped: PairingRequest = db
        .get_by_id(collections::PAIRING_REQUESTS, &request_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stamped.processed_by.is_some());
}

#[tokio::test]
async fn consistent_state_reconciles_as_noop() {
    require_emulator!();

    let db = test_db().await;
    let uid_a = unique_id("recA");
    let uid_b = unique_id("recB");

    // Already linked with healthy balances (the authoritative path ran).
    let mut user_a = test_user("Ana", PHONE_A, 9);
    user_a.pareado_uid = Some(uid_b.clone());
    user_a.pareado_com = Some(PHONE_B.to_string());
    let mut user_b = test_user("Bruno", PHONE_B, 7);
    user_b.pareado_uid = Some(uid_a.clone());
    user_b.pareado_com = Some(PHONE_A.to_string());
    db.upsert_user(&uid_a, &user_a).await.unwrap();
    db.upsert_user(&uid_b, &user_b).await.unwrap();

    let request_id = PairingRequest::doc_id(&uid_a, &uid_b);
    let mut request = pending_request(&uid_a, &uid_b);
    request.status = RequestStatus::Accepted;
    db.upsert(collections::PAIRING_REQUESTS, &request_id, &request)
        .await
        .unwrap();

    reconciler::on_request_updated(&db, &request_id, Some(RequestStatus::Pending))
        .await
        .unwrap();

    // Balances untouched: no re-derived effects on consistent state.
    let user_a = db.get_user(&uid_a).await.unwrap().unwrap();
    let user_b = db.get_user(&uid_b).await.unwrap().unwrap();
    assert_eq!(user_a.foguinhos, 9);
    assert_eq!(user_b.foguinhos, 7);
}

#[tokio::test]
async fn repeated_accept_event_is_a_noop() {
    require_emulator!();

    let db = test_db().await;
    let uid_a = unique_id("recA");
    let uid_b = unique_id("recB");
    db.upsert_user(&uid_a, &test_user("Ana", PHONE_A, 0)).await.unwrap();
    db.upsert_user(&uid_b, &test_user("Bruno", PHONE_B, 0)).await.unwrap();

    let request_id = PairingRequest::doc_id(&uid_a, &uid_b);
    let mut request = pending_request(&uid_a, &uid_b);
    request.status = RequestStatus::Accepted;
    db.upsert(collections::PAIRING_REQUESTS, &request_id, &request)
        .await
        .unwrap();

    // before=accepted means this is a redelivery of an old transition.
    reconciler::on_request_updated(&db, &request_id, Some(RequestStatus::Accepted))
        .await
        .unwrap();

    let user_a = db.get_user(&uid_a).await.unwrap().unwrap();
    assert_eq!(user_a.pareado_uid, None, "re-entry must not re-apply effects");
}

#[tokio::test]
async fn direct_reject_clears_pending_marker() {
    require_emulator!();

    let db = test_db().await;
    let uid_a = unique_id("recA");
    let uid_b = unique_id("recB");

    let mut user_a = test_user("Ana", PHONE_A, 5);
    user_a.pareado_com = Some(PairingState::pending_marker(PHONE_B));
    db.upsert_user(&uid_a, &user_a).await.unwrap();
    db.upsert_user(&uid_b, &test_user("Bruno", PHONE_B, 5)).await.unwrap();

    let request_id = PairingRequest::doc_id(&uid_a, &uid_b);
    let mut request = pending_request(&uid_a, &uid_b);
    request.status = RequestStatus::Rejected;
    db.upsert(collections::PAIRING_REQUESTS, &request_id, &request)
        .await
        .unwrap();

    reconciler::on_request_updated(&db, &request_id, Some(RequestStatus::Pending))
        .await
        .unwrap();

    let user_a = db.get_user(&uid_a).await.unwrap().unwrap();
    assert_eq!(user_a.pareado_com, None);

    // The marker of an unrelated outgoing request must survive a stray
    // reject event.
    let uid_c = unique_id("recC");
    let mut user_c = test_user("Carla", "11990000003", 5);
    user_c.pareado_com = Some(PairingState::pending_marker("11990000004"));
    db.upsert_user(&uid_c, &user_c).await.unwrap();

    let other_request_id = PairingRequest::doc_id(&uid_c, &uid_b);
    let mut other = pending_request(&uid_c, &uid_b);
    other.sender_uid = uid_c.clone();
    other.sender_phone = Some("11990000003".to_string());
    other.status = RequestStatus::Rejected;
    db.upsert(collections::PAIRING_REQUESTS, &other_request_id, &other)
        .await
        .unwrap();

    reconciler::on_request_updated(&db, &other_request_id, Some(RequestStatus::Pending))
        .await
        .unwrap();

    let user_c = db.get_user(&uid_c).await.unwrap().unwrap();
    assert_eq!(
        user_c.pareado_com.as_deref(),
        Some("pending_11990000004"),
        "marker for a different phone is untouched"
    );
}
