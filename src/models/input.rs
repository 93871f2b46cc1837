//! Input documents: the one-shot command queue driving all state changes.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// The seven supported input types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Gift,
    PairingRequest,
    PairingResponse,
    PairingCancel,
    PairingUnpair,
    DailyCheckIn,
    MomentRedeem,
}

impl InputKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "gift" => Some(Self::Gift),
            "pairing_request" => Some(Self::PairingRequest),
            "pairing_response" => Some(Self::PairingResponse),
            "pairing_cancel" => Some(Self::PairingCancel),
            "pairing_unpair" => Some(Self::PairingUnpair),
            "daily_check_in" => Some(Self::DailyCheckIn),
            "moment_redeem" => Some(Self::MomentRedeem),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gift => "gift",
            Self::PairingRequest => "pairing_request",
            Self::PairingResponse => "pairing_response",
            Self::PairingCancel => "pairing_cancel",
            Self::PairingUnpair => "pairing_unpair",
            Self::DailyCheckIn => "daily_check_in",
            Self::MomentRedeem => "moment_redeem",
        }
    }
}

/// Stable error codes written to `inputs/{id}.error`.
///
/// These are part of the client contract: the app polls the input document
/// and switches UI copy on the code string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    MissingUids,
    InvalidAmount,
    UsersNotPaired,
    MissingPairingInfo,
    ReceiverNotFound,
    SenderNotFound,
    SenderAlreadyPaired,
    ReceiverAlreadyPaired,
    MissingResponseInfo,
    RequestNotFound,
    MissingCancelInfo,
    MissingCheckinInfo,
    CheckinDuplicate,
    MissingRedeemInfo,
    InsufficientBalance,
    MissingUnpairInfo,
    UserNotFound,
    UnsupportedType,
}

impl InputError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingUids => "missing_uids",
            Self::InvalidAmount => "invalid_amount",
            Self::UsersNotPaired => "usuarios_nao_pareados",
            Self::MissingPairingInfo => "missing_pairing_info",
            Self::ReceiverNotFound => "receiver_not_found",
            Self::SenderNotFound => "sender_not_found",
            Self::SenderAlreadyPaired => "sender_already_paired",
            Self::ReceiverAlreadyPaired => "receiver_already_paired",
            Self::MissingResponseInfo => "missing_response_info",
            Self::RequestNotFound => "request_not_found",
            Self::MissingCancelInfo => "missing_cancel_info",
            Self::MissingCheckinInfo => "missing_checkin_info",
            Self::CheckinDuplicate => "checkin_duplicate",
            Self::MissingRedeemInfo => "missing_redeem_info",
            Self::InsufficientBalance => "saldo_insuficiente",
            Self::MissingUnpairInfo => "missing_unpair_info",
            Self::UserNotFound => "usuario_nao_encontrado",
            Self::UnsupportedType => "unsupported_type",
        }
    }
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Who stamped an input as processed (diagnostic field).
pub const PROCESSED_BY: &str = "casal-api.process_input";

/// An input document (`inputs/{id}`).
///
/// Only the lifecycle fields are typed; type-specific payload fields stay in
/// the flattened map and are parsed by the matching transition handler.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Input {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "fromUid", default, skip_serializing_if = "Option::is_none")]
    pub from_uid: Option<String>,
    #[serde(default)]
    pub processed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "retryCount", default)]
    pub retry_count: u32,
    #[serde(
        rename = "processedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub processed_at: Option<String>,
    #[serde(
        rename = "processedBy",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub processed_by: Option<String>,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl Input {
    /// Parse the type-specific payload fields into a typed struct.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(serde_json::Value::Object(self.payload.clone())).ok()
    }

    /// Stamp the input as consumed.
    pub fn mark_processed(&mut self, now: &str) {
        self.processed = true;
        self.processed_at = Some(now.to_string());
        self.processed_by = Some(PROCESSED_BY.to_string());
    }
}

/// Coerce a loosely typed numeric payload value to an integer (floor),
/// mirroring how clients send amounts (number or numeric string).
pub fn coerce_int(value: Option<&serde_json::Value>) -> Option<i64> {
    match value? {
        serde_json::Value::Number(n) => n.as_f64().map(|f| f.floor() as i64),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.floor() as i64),
        _ => None,
    }
}

// ─── Typed payloads (per input type) ─────────────────────────

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GiftPayload {
    #[serde(default)]
    pub to_uid: Option<String>,
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    #[serde(default)]
    pub from_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PairingRequestPayload {
    #[serde(default)]
    pub to_uid: Option<String>,
    #[serde(default)]
    pub to_phone: Option<String>,
    #[serde(default)]
    pub to_name: Option<String>,
    #[serde(default)]
    pub from_phone: Option<String>,
    #[serde(default)]
    pub from_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PairingResponsePayload {
    #[serde(default)]
    pub request_id: Option<String>,
    /// "accepted" | "rejected"
    #[serde(default)]
    pub response: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PairingCancelPayload {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub partner_uid: Option<String>,
    #[serde(default)]
    pub partner_phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PairingUnpairPayload {
    #[serde(default)]
    pub partner_uid: Option<String>,
    #[serde(default)]
    pub partner_phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DailyCheckInPayload {
    #[serde(default)]
    pub partner_uid: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MomentRedeemPayload {
    #[serde(default)]
    pub partner_uid: Option<String>,
    #[serde(default)]
    pub pareamento_id: Option<String>,
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_keeps_payload_fields_through_round_trip() {
        let raw = serde_json::json!({
            "type": "gift",
            "fromUid": "uid-a",
            "toUid": "uid-b",
            "amount": 3,
            "processed": false
        });

        let mut input: Input = serde_json::from_value(raw).unwrap();
        let payload: GiftPayload = input.payload_as().unwrap();
        assert_eq!(payload.to_uid.as_deref(), Some("uid-b"));
        assert_eq!(coerce_int(payload.amount.as_ref()), Some(3));

        input.mark_processed("2024-01-15T10:00:00Z");
        let back = serde_json::to_value(&input).unwrap();
        assert_eq!(back["toUid"], "uid-b");
        assert_eq!(back["processed"], true);
        assert_eq!(back["processedBy"], PROCESSED_BY);
    }

    #[test]
    fn coerce_int_floors_and_parses_strings() {
        assert_eq!(coerce_int(Some(&serde_json::json!(3.9))), Some(3));
        assert_eq!(coerce_int(Some(&serde_json::json!("12"))), Some(12));
        assert_eq!(coerce_int(Some(&serde_json::json!("abc"))), None);
        assert_eq!(coerce_int(Some(&serde_json::json!(null))), None);
        assert_eq!(coerce_int(None), None);
    }

    #[test]
    fn unknown_input_type_is_unparseable() {
        assert_eq!(InputKind::parse("weekly_challenge_seed"), None);
        assert_eq!(InputKind::parse("gift"), Some(InputKind::Gift));
    }
}
