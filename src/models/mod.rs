// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod input;
pub mod moment;
pub mod notification;
pub mod pairing;
pub mod user;

pub use input::{Input, InputError, InputKind};
pub use moment::{MomentItem, MomentTask, TaskStatus};
pub use notification::Notification;
pub use pairing::{are_users_paired, Couple, PairingRequest, PairingState, RequestStatus};
pub use user::{AchievementStats, UnlockedAchievement, User};
