// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Achievement rule table and evaluator.
//!
//! Rules are static records with pure predicate/snapshot functions over
//! before/after stat snapshots, so each rule is unit-testable without a
//! transaction. The evaluator never opens its own transaction: callers apply
//! the returned mutations inside the transition handler's transaction, which
//! keeps "all achievements of an event commit together or not at all".

use crate::models::{AchievementStats, Notification, UnlockedAchievement};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// What kind of event an evaluation runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchievementTrigger {
    DailyCheckIn,
    MomentRedeem,
    /// Rule-side wildcard: evaluated on every trigger.
    Any,
}

impl AchievementTrigger {
    fn matches(&self, event: AchievementTrigger) -> bool {
        *self == AchievementTrigger::Any || *self == event
    }
}

/// A single achievement rule.
pub struct AchievementDef {
    pub id: &'static str,
    pub trigger: AchievementTrigger,
    pub titulo: &'static str,
    pub descricao: &'static str,
    pub icone: &'static str,
    pub reward: i64,
    /// (before, after) -> satisfied. Must be pure.
    pub predicate: fn(&AchievementStats, &AchievementStats) -> bool,
    /// Progress counter backing the rule, for logging and client display.
    pub snapshot: fn(&AchievementStats) -> u32,
}

/// The fixed rule table.
pub const DEFINITIONS: &[AchievementDef] = &[
    AchievementDef {
        id: "primeiro_checkin",
        trigger: AchievementTrigger::DailyCheckIn,
        titulo: "Primeiro Check-in",
        descricao: "Fez o primeiro check-in diário do casal",
        icone: "fa-fire",
        reward: 5,
        predicate: |_, after| after.total_checkins >= 1,
        snapshot: |stats| stats.total_checkins,
    },
    AchievementDef {
        id: "chama_acesa",
        trigger: AchievementTrigger::DailyCheckIn,
        titulo: "Chama Acesa",
        descricao: "3 dias seguidos de check-in",
        icone: "fa-fire",
        reward: 10,
        predicate: |_, after| after.current_daily_streak >= 3,
        snapshot: |stats| stats.current_daily_streak,
    },
    AchievementDef {
        id: "semana_em_chamas",
        trigger: AchievementTrigger::DailyCheckIn,
        titulo: "Semana em Chamas",
        descricao: "7 dias seguidos de check-in",
        icone: "fa-fire",
        reward: 25,
        predicate: |_, after| after.current_daily_streak >= 7,
        snapshot: |stats| stats.current_daily_streak,
    },
    AchievementDef {
        id: "mes_inseparavel",
        trigger: AchievementTrigger::DailyCheckIn,
        titulo: "Mês Inseparável",
        descricao: "30 dias seguidos de check-in",
        icone: "fa-fire",
        reward: 100,
        predicate: |_, after| after.current_daily_streak >= 30,
        snapshot: |stats| stats.current_daily_streak,
    },
    AchievementDef {
        id: "presenca_constante",
        trigger: AchievementTrigger::DailyCheckIn,
        titulo: "Presença Constante",
        descricao: "30 check-ins no total",
        icone: "fa-calendar-check",
        reward: 50,
        predicate: |_, after| after.total_checkins >= 30,
        snapshot: |stats| stats.total_checkins,
    },
    AchievementDef {
        id: "primeiro_momento",
        trigger: AchievementTrigger::MomentRedeem,
        titulo: "Primeiro Momento",
        descricao: "Resgatou o primeiro momento",
        icone: "fa-shopping-bag",
        reward: 10,
        predicate: |_, after| after.moments_redeemed.total >= 1,
        snapshot: |stats| stats.moments_redeemed.total,
    },
    AchievementDef {
        id: "colecionador_de_momentos",
        trigger: AchievementTrigger::MomentRedeem,
        titulo: "Colecionador de Momentos",
        descricao: "10 momentos resgatados",
        icone: "fa-shopping-bag",
        reward: 40,
        predicate: |_, after| after.moments_redeemed.total >= 10,
        snapshot: |stats| stats.moments_redeemed.total,
    },
    AchievementDef {
        id: "grande_gastador",
        trigger: AchievementTrigger::Any,
        titulo: "Grande Gastador",
        descricao: "100 foguinhos gastos em momentos",
        icone: "fa-coins",
        reward: 30,
        predicate: |_, after| after.total_foguinhos_gastos >= 100,
        snapshot: |stats| stats.total_foguinhos_gastos.max(0) as u32,
    },
];

/// Outcome of one evaluation: mutations for the caller's transaction.
#[derive(Default)]
pub struct Evaluation {
    /// Newly unlocked achievements, keyed by rule id.
    pub unlocked: Vec<(String, UnlockedAchievement)>,
    /// Combined balance increment for all unlocks.
    pub reward_total: i64,
    /// One notification per unlock, for the achieving user.
    pub notifications: Vec<Notification>,
}

impl Evaluation {
    pub fn is_empty(&self) -> bool {
        self.unlocked.is_empty()
    }
}

/// Evaluate every rule matching `trigger` that the user has not unlocked yet.
///
/// Deterministic: the same (trigger, before, after, already-unlocked, now)
/// always yields the same unlocked set, in table order.
pub fn evaluate(
    trigger: AchievementTrigger,
    before: &AchievementStats,
    after: &AchievementStats,
    already_unlocked: &HashMap<String, UnlockedAchievement>,
    user_id: &str,
    now: DateTime<Utc>,
) -> Evaluation {
    let mut result = Evaluation::default();

    for def in DEFINITIONS {
        if !def.trigger.matches(trigger) || already_unlocked.contains_key(def.id) {
            continue;
        }
        if !(def.predicate)(before, after) {
            continue;
        }

        tracing::info!(
            user_id,
            achievement = def.id,
            progress = (def.snapshot)(after),
            reward = def.reward,
            "Achievement unlocked"
        );

        result.unlocked.push((
            def.id.to_string(),
            UnlockedAchievement {
                unlocked_at: format_utc_rfc3339(now),
                titulo: def.titulo.to_string(),
                descricao: def.descricao.to_string(),
                icone: def.icone.to_string(),
                reward: def.reward,
            },
        ));
        result.reward_total += def.reward;
        result.notifications.push(Notification::new(
            user_id,
            "Conquista desbloqueada!",
            format!("{} (+{} foguinhos)", def.titulo, def.reward),
            def.icone,
            now,
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn checkin_stats(total: u32, streak: u32) -> AchievementStats {
        AchievementStats {
            total_checkins: total,
            current_daily_streak: streak,
            best_daily_streak: streak,
            ..Default::default()
        }
    }

    #[test]
    fn first_checkin_unlocks_only_first_rule() {
        let before = AchievementStats::default();
        let after = checkin_stats(1, 1);

        let eval = evaluate(
            AchievementTrigger::DailyCheckIn,
            &before,
            &after,
            &HashMap::new(),
            "uid-a",
            now(),
        );

        let ids: Vec<_> = eval.unlocked.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["primeiro_checkin"]);
        assert_eq!(eval.reward_total, 5);
        assert_eq!(eval.notifications.len(), 1);
        assert_eq!(eval.notifications[0].user_id, "uid-a");
    }

    #[test]
    fn streak_rules_unlock_at_thresholds() {
        let before = checkin_stats(6, 6);
        let after = checkin_stats(7, 7);
        let already: HashMap<_, _> = evaluate(
            AchievementTrigger::DailyCheckIn,
            &AchievementStats::default(),
            &checkin_stats(6, 6),
            &HashMap::new(),
            "uid-a",
            now(),
        )
        .unlocked
        .into_iter()
        .collect();

        // primeiro_checkin + chama_acesa already granted on earlier days
        assert!(already.contains_key("primeiro_checkin"));
        assert!(already.contains_key("chama_acesa"));

        let eval = evaluate(
            AchievementTrigger::DailyCheckIn,
            &before,
            &after,
            &already,
            "uid-a",
            now(),
        );
        let ids: Vec<_> = eval.unlocked.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["semana_em_chamas"]);
        assert_eq!(eval.reward_total, 25);
    }

    #[test]
    fn already_unlocked_rules_never_regrant() {
        let after = checkin_stats(5, 5);
        let first = evaluate(
            AchievementTrigger::DailyCheckIn,
            &AchievementStats::default(),
            &after,
            &HashMap::new(),
            "uid-a",
            now(),
        );
        let already: HashMap<_, _> = first.unlocked.into_iter().collect();

        let again = evaluate(
            AchievementTrigger::DailyCheckIn,
            &after,
            &after,
            &already,
            "uid-a",
            now(),
        );
        assert!(again.is_empty());
        assert_eq!(again.reward_total, 0);
    }

    #[test]
    fn trigger_filters_rule_subset() {
        let mut after = AchievementStats::default();
        after.total_checkins = 1;
        after.current_daily_streak = 1;
        after.moments_redeemed.total = 1;

        let eval = evaluate(
            AchievementTrigger::MomentRedeem,
            &AchievementStats::default(),
            &after,
            &HashMap::new(),
            "uid-a",
            now(),
        );

        // Check-in rules are satisfied but not evaluated on this trigger.
        let ids: Vec<_> = eval.unlocked.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["primeiro_momento"]);
    }

    #[test]
    fn any_trigger_rules_fire_on_both_events() {
        let mut after = AchievementStats::default();
        after.total_foguinhos_gastos = 120;

        for trigger in [
            AchievementTrigger::DailyCheckIn,
            AchievementTrigger::MomentRedeem,
        ] {
            let eval = evaluate(
                trigger,
                &AchievementStats::default(),
                &after,
                &HashMap::new(),
                "uid-a",
                now(),
            );
            assert!(
                eval.unlocked.iter().any(|(id, _)| id == "grande_gastador"),
                "grande_gastador should fire on {trigger:?}"
            );
        }
    }

    #[test]
    fn evaluation_is_deterministic() {
        let before = checkin_stats(2, 2);
        let after = checkin_stats(3, 3);

        let a = evaluate(
            AchievementTrigger::DailyCheckIn,
            &before,
            &after,
            &HashMap::new(),
            "uid-a",
            now(),
        );
        let b = evaluate(
            AchievementTrigger::DailyCheckIn,
            &before,
            &after,
            &HashMap::new(),
            "uid-a",
            now(),
        );

        let ids =
            |e: &Evaluation| e.unlocked.iter().map(|(id, _)| id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
        assert_eq!(a.reward_total, b.reward_total);
        assert_eq!(a.unlocked[0].1.unlocked_at, b.unlocked[0].1.unlocked_at);
    }

    #[test]
    fn rule_ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for def in DEFINITIONS {
            assert!(seen.insert(def.id), "duplicate achievement id {}", def.id);
        }
    }
}
