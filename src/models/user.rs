//! User model for storage and the pairing/reward state machine.

use crate::time_utils;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// User profile stored in Firestore (`usuarios/{uid}`).
///
/// The collection is shared with the app client, which also writes fields
/// this backend never touches (profile data, preferences). Those are kept
/// through rewrites via the flattened `extra` map.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    /// Phone number as entered by the user; matched after digit-stripping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
    /// FCM device token for push delivery (owned by the push collaborator).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fcm_token: Option<String>,
    /// Reward-point balance. Never negative.
    #[serde(default)]
    pub foguinhos: i64,
    /// Partner phone, or a `pending_<phone>` marker for an outstanding
    /// outgoing request. Decode with [`crate::models::PairingState`];
    /// never sniff the prefix elsewhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pareado_com: Option<String>,
    /// Partner uid once pairing is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pareado_uid: Option<String>,
    /// Last daily check-in (RFC3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check_in_date: Option<String>,
    #[serde(default)]
    pub achievement_stats: AchievementStats,
    /// Unlocked achievements, keyed by achievement id.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub conquistas: HashMap<String, UnlockedAchievement>,
    /// Fields owned by other writers, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl User {
    /// Display name with the fallback used in notification copy.
    pub fn display_name(&self) -> &str {
        self.nome.as_deref().unwrap_or("Seu parceiro")
    }

    /// Reset all pairing-related state (unpair effect).
    pub fn reset_pairing(&mut self) {
        self.pareado_com = None;
        self.pareado_uid = None;
        self.foguinhos = 0;
        self.last_check_in_date = None;
    }
}

/// Counters feeding the achievement rule table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AchievementStats {
    pub total_checkins: u32,
    pub current_daily_streak: u32,
    pub best_daily_streak: u32,
    /// Lifetime foguinhos spent on moment redemptions.
    pub total_foguinhos_gastos: i64,
    pub moments_redeemed: MomentsRedeemed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct MomentsRedeemed {
    pub total: u32,
    pub por_categoria: HashMap<String, u32>,
}

impl AchievementStats {
    /// Record a daily check-in at `now`, given the previous check-in time.
    ///
    /// The streak increments only when the previous check-in was exactly one
    /// UTC calendar day earlier; any gap resets it to 1. Same-day duplicates
    /// are rejected by the handler before this is called.
    pub fn record_check_in(&mut self, previous: Option<DateTime<Utc>>, now: DateTime<Utc>) {
        self.total_checkins += 1;

        let consecutive = previous
            .map(|prev| time_utils::calendar_days_between(prev, now) == 1)
            .unwrap_or(false);
        self.current_daily_streak = if consecutive {
            self.current_daily_streak + 1
        } else {
            1
        };
        self.best_daily_streak = self.best_daily_streak.max(self.current_daily_streak);
    }

    /// Record a moment redemption: one entry per item category, plus the
    /// combined cost.
    pub fn record_redeem(&mut self, categories: &[String], total_cost: i64) {
        self.moments_redeemed.total += categories.len() as u32;
        for categoria in categories {
            *self
                .moments_redeemed
                .por_categoria
                .entry(categoria.clone())
                .or_insert(0) += 1;
        }
        self.total_foguinhos_gastos += total_cost;
    }
}

/// An unlocked achievement as stored under `conquistas.<id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockedAchievement {
    pub unlocked_at: String,
    pub titulo: String,
    #[serde(default)]
    pub descricao: String,
    #[serde(default)]
    pub icone: String,
    pub reward: i64,
}
