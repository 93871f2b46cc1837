// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod dispatcher;
pub mod identity;
pub mod push;
pub mod reconciler;
pub mod task_bonus;
pub mod transitions;

pub use identity::{AuthError, IdentityVerifier, VerifiedUser};
pub use push::PushService;
pub use transitions::TransitionOutcome;
