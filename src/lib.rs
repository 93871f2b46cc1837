// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Casal-API: backend for a couples-pairing app.
//!
//! This crate provides the event-driven backend that processes queued
//! Input commands (gifts, pairing requests, check-ins, moment redemptions)
//! against Firestore and hands notifications off to FCM.

pub mod achievements;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod phone;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{IdentityVerifier, PushService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub identity: Arc<IdentityVerifier>,
    pub push: PushService,
}
