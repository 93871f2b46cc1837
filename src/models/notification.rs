//! Notification documents consumed by the push-delivery collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time_utils::format_utc_rfc3339;

/// A fire-and-forget notification (`notificacoes/{id}`).
///
/// Ids are derived from the triggering document, so at-least-once event
/// redelivery overwrites the same notification instead of duplicating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub user_id: String,
    pub titulo: String,
    pub mensagem: String,
    pub icone: String,
    pub lida: bool,
    pub timestamp: String,
}

impl Notification {
    pub fn new(
        user_id: impl Into<String>,
        titulo: impl Into<String>,
        mensagem: impl Into<String>,
        icone: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            titulo: titulo.into(),
            mensagem: mensagem.into(),
            icone: icone.into(),
            lida: false,
            timestamp: format_utc_rfc3339(now),
        }
    }
}
