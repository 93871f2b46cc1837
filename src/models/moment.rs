//! Moment redemption items and the tasks they create.

use crate::models::input::coerce_int;
use serde::{Deserialize, Serialize};

/// At most this many items per redemption; extras are dropped.
pub const MAX_MOMENT_ITEMS: usize = 4;
/// Per-item cost bounds (exclusive zero, inclusive max).
pub const MAX_MOMENT_COST: i64 = 1000;

/// A sanitized reward item from a `moment_redeem` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentItem {
    pub nome: String,
    pub custo_foguinhos: i64,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub categoria: String,
    #[serde(default)]
    pub img: String,
}

impl MomentItem {
    pub fn categoria_or_default(&self) -> &str {
        if self.categoria.is_empty() {
            "Geral"
        } else {
            &self.categoria
        }
    }

    pub fn emoji_or_default(&self) -> &str {
        if self.emoji.is_empty() {
            "🛍️"
        } else {
            &self.emoji
        }
    }
}

/// Sanitize raw redemption items from the client.
///
/// Malformed entries (missing name, non-positive or oversized cost) are
/// silently dropped rather than failing the whole redemption; at most
/// [`MAX_MOMENT_ITEMS`] survive.
pub fn sanitize_moment_items(raw: &[serde_json::Value]) -> Vec<MomentItem> {
    let mut sanitized = Vec::new();

    for value in raw {
        let Some(obj) = value.as_object() else {
            continue;
        };

        let nome = obj
            .get("nome")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or("");
        let Some(custo) = coerce_int(obj.get("custoFoguinhos")) else {
            continue;
        };
        if nome.is_empty() || custo <= 0 || custo > MAX_MOMENT_COST {
            continue;
        }

        let text = |key: &str| {
            obj.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };

        sanitized.push(MomentItem {
            nome: nome.to_string(),
            custo_foguinhos: custo,
            emoji: text("emoji"),
            categoria: text("categoria"),
            img: text("img"),
        });

        if sanitized.len() >= MAX_MOMENT_ITEMS {
            break;
        }
    }

    sanitized
}

/// Task lifecycle. `Realizado` pays the one-time completion bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pendente,
    Realizado,
    Cancelado,
    #[serde(other)]
    Desconhecido,
}

/// A redeemed moment awaiting fulfillment (`tarefasMomentos/{inputId_idx}`).
///
/// The document id is derived from the originating input so redelivered
/// events overwrite instead of duplicating tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentTask {
    pub momento_nome: String,
    pub momento_emoji: String,
    pub momento_categoria: String,
    pub custo_foguinhos: i64,
    pub status: TaskStatus,
    pub data_resgate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_conclusao: Option<String>,
    pub id_pareamento: String,
    pub resgatado_por_uid: String,
    #[serde(default)]
    pub resgatado_por_nome: String,
    pub executado_por_uid: String,
    #[serde(default)]
    pub executado_por_nome: String,
    /// Completion-bonus idempotence guard.
    #[serde(default)]
    pub bonus_concedido: bool,
}
