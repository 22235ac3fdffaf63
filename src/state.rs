// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{MigrationPolicy, Settings, TokenDecoder};
use crate::config::AppConfig;
use crate::storage::AccountDatabase;

/// Shared request state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub decoder: TokenDecoder,
    pub accounts: Arc<AccountDatabase>,
    pub policy: MigrationPolicy,
    /// Expose token and identity details in login responses.
    pub debug_mode: bool,
}

impl AppState {
    pub fn new(settings: Settings, accounts: AccountDatabase) -> Self {
        Self {
            decoder: TokenDecoder::new(Arc::new(settings)),
            accounts: Arc::new(accounts),
            policy: MigrationPolicy::default(),
            debug_mode: false,
        }
    }

    pub fn from_config(config: &AppConfig, accounts: AccountDatabase) -> Self {
        Self::new(config.settings.clone(), accounts)
            .with_policy(config.policy)
            .with_debug_mode(config.debug_mode)
    }

    pub fn with_policy(mut self, policy: MigrationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }
}
