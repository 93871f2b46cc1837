//! Pairing entities: requests, couples, and the pairing-state predicate.

use crate::models::User;
use crate::phone::{last_four, normalize_phone};
use serde::{Deserialize, Serialize};

const PENDING_PREFIX: &str = "pending_";

/// Lifecycle of a pairing request. `Pending` is the only state the
/// reconciler and cancel handler act from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A pairing request (`pairingRequests/{senderUid_receiverUid}`, uids sorted).
///
/// One document exists per unordered pair; resubmission overwrites it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingRequest {
    pub sender_uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_name: Option<String>,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<String>,
}

impl PairingRequest {
    /// Deterministic document id for the unordered uid pair.
    pub fn doc_id(uid_a: &str, uid_b: &str) -> String {
        let mut parts = [uid_a, uid_b];
        parts.sort_unstable();
        parts.join("_")
    }
}

/// A confirmed couple (`pareamentos/{sortedPhoneDigits}`), denormalized by
/// phone pair. Created on acceptance, deleted on unpairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Couple {
    pub pessoa1: String,
    pub pessoa2: String,
    pub pessoa1_uid: String,
    pub pessoa2_uid: String,
    pub data_pareamento: String,
    pub id_amigavel: String,
}

impl Couple {
    /// Document id: normalized phone digits, sorted, joined with `_`.
    /// `None` when either phone has no digits (no stable key exists).
    pub fn doc_id(phone_a: &str, phone_b: &str) -> Option<String> {
        let mut digits = [normalize_phone(phone_a)?, normalize_phone(phone_b)?];
        digits.sort_unstable();
        Some(format!("{}_{}", digits[0], digits[1]))
    }

    /// Short human-friendly id: last 4 digits of each phone, sender first.
    pub fn friendly_id(sender_phone: &str, receiver_phone: &str) -> String {
        format!("{}{}", last_four(sender_phone), last_four(receiver_phone))
    }

    /// Build the denormalized couple record for an accepted pairing.
    pub fn link(
        sender_uid: &str,
        sender_phone: &str,
        receiver_uid: &str,
        receiver_phone: &str,
        now: &str,
    ) -> Option<(String, Self)> {
        let doc_id = Self::doc_id(sender_phone, receiver_phone)?;
        let mut digits = [
            normalize_phone(sender_phone)?,
            normalize_phone(receiver_phone)?,
        ];
        digits.sort_unstable();
        let [pessoa1, pessoa2] = digits;

        Some((
            doc_id,
            Self {
                pessoa1,
                pessoa2,
                pessoa1_uid: sender_uid.to_string(),
                pessoa2_uid: receiver_uid.to_string(),
                data_pareamento: now.to_string(),
                id_amigavel: Self::friendly_id(sender_phone, receiver_phone),
            },
        ))
    }
}

/// Decoded pairing state of a user record.
///
/// The store keeps this as the overloaded `pareadoCom` string (partner phone,
/// or a `pending_<phone>` marker); this enum is the only place that encoding
/// is interpreted or produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingState {
    Unpaired,
    /// Outstanding outgoing request to `phone` (the marker on the sender).
    PendingOutgoing { phone: String },
    /// Outstanding incoming request from `phone`; not stored on the user
    /// record, derived from an open request addressed to them.
    PendingIncoming { phone: String },
    /// Linked to a partner. Legacy records may carry only one of the two
    /// fields, which is why the pairing predicate checks both.
    Paired {
        phone: Option<String>,
        uid: Option<String>,
    },
}

impl PairingState {
    /// Decode the state stored on a user record alone.
    pub fn of(user: &User) -> Self {
        match (&user.pareado_com, &user.pareado_uid) {
            (Some(com), _) if com.starts_with(PENDING_PREFIX) => Self::PendingOutgoing {
                phone: com[PENDING_PREFIX.len()..].to_string(),
            },
            (None, None) => Self::Unpaired,
            (com, uid) => Self::Paired {
                phone: com.clone(),
                uid: uid.clone(),
            },
        }
    }

    /// Decode a user's state, upgrading `Unpaired` to `PendingIncoming` when
    /// an open request addressed to them exists.
    pub fn derive(user: &User, incoming: Option<&PairingRequest>) -> Self {
        let state = Self::of(user);
        if state != Self::Unpaired {
            return state;
        }
        match incoming {
            Some(req) if req.status == RequestStatus::Pending => Self::PendingIncoming {
                phone: req.sender_phone.clone().unwrap_or_default(),
            },
            _ => Self::Unpaired,
        }
    }

    /// Encode the outstanding-request marker stored on the sender.
    pub fn pending_marker(phone: &str) -> String {
        format!("{PENDING_PREFIX}{phone}")
    }
}

/// Whether two user records mutually reference each other as partners.
///
/// Each direction is satisfied by either the uid back-reference or a
/// normalized phone match; the double check tolerates partially migrated
/// records where only one linkage field was ever set. Every
/// balance-affecting operation between two users fails closed on this.
pub fn are_users_paired(
    sender: &User,
    partner: &User,
    sender_uid: &str,
    partner_uid: &str,
) -> bool {
    let sender_matches_uid = sender.pareado_uid.as_deref() == Some(partner_uid);
    let partner_matches_uid = partner.pareado_uid.as_deref() == Some(sender_uid);

    let phone_match = |target: &Option<String>, own: &Option<String>| -> bool {
        match (
            target.as_deref().and_then(normalize_phone),
            own.as_deref().and_then(normalize_phone),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    };

    let sender_phones_match = phone_match(&sender.pareado_com, &partner.telefone);
    let partner_phones_match = phone_match(&partner.pareado_com, &sender.telefone);

    (sender_matches_uid || sender_phones_match) && (partner_matches_uid || partner_phones_match)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(telefone: &str, pareado_com: Option<&str>, pareado_uid: Option<&str>) -> User {
        User {
            telefone: Some(telefone.to_string()),
            pareado_com: pareado_com.map(String::from),
            pareado_uid: pareado_uid.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn paired_by_uid_back_references() {
        let a = user("111", None, Some("uid-b"));
        let b = user("222", None, Some("uid-a"));
        assert!(are_users_paired(&a, &b, "uid-a", "uid-b"));
    }

    #[test]
    fn paired_by_phone_when_uid_missing() {
        // Legacy records: only the phone linkage was set, with formatting noise.
        let a = user("11 9000-0001", Some("(11) 90000-0002"), None);
        let b = user("11 90000-0002", Some("11 9000 0001"), None);
        assert!(are_users_paired(&a, &b, "uid-a", "uid-b"));
    }

    #[test]
    fn one_sided_links_are_not_paired() {
        let a = user("111", None, Some("uid-b"));
        let b = user("222", None, None);
        assert!(!are_users_paired(&a, &b, "uid-a", "uid-b"));
    }

    #[test]
    fn pending_marker_is_not_a_pairing() {
        let a = user("111", Some("pending_222"), None);
        let b = user("222", None, None);
        assert!(!are_users_paired(&a, &b, "uid-a", "uid-b"));
        assert_eq!(
            PairingState::of(&a),
            PairingState::PendingOutgoing {
                phone: "222".to_string()
            }
        );
    }

    #[test]
    fn state_decoding() {
        assert_eq!(PairingState::of(&user("1", None, None)), PairingState::Unpaired);
        assert_eq!(
            PairingState::of(&user("1", Some("222"), Some("uid-b"))),
            PairingState::Paired {
                phone: Some("222".to_string()),
                uid: Some("uid-b".to_string())
            }
        );
    }

    #[test]
    fn derive_sees_incoming_request() {
        let me = user("222", None, None);
        let req = PairingRequest {
            sender_uid: "uid-a".to_string(),
            sender_name: None,
            sender_phone: Some("111".to_string()),
            receiver_uid: Some("uid-b".to_string()),
            receiver_phone: Some("222".to_string()),
            receiver_name: None,
            status: RequestStatus::Pending,
            timestamp: None,
            processed_by: None,
            processed_at: None,
        };

        assert_eq!(
            PairingState::derive(&me, Some(&req)),
            PairingState::PendingIncoming {
                phone: "111".to_string()
            }
        );

        let mut rejected = req;
        rejected.status = RequestStatus::Rejected;
        assert_eq!(
            PairingState::derive(&me, Some(&rejected)),
            PairingState::Unpaired
        );
    }

    #[test]
    fn request_and_couple_ids_are_order_independent() {
        assert_eq!(
            PairingRequest::doc_id("uid-b", "uid-a"),
            PairingRequest::doc_id("uid-a", "uid-b")
        );
        assert_eq!(
            Couple::doc_id("11 9000-0002", "11 9000-0001"),
            Some("1190000001_1190000002".to_string())
        );
        assert_eq!(Couple::doc_id("abc", "11990000001"), None);
    }

    #[test]
    fn friendly_id_keeps_sender_first() {
        assert_eq!(Couple::friendly_id("11990000001", "11990000002"), "00010002");
    }
}
