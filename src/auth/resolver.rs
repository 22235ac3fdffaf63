// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Resolution
//!
//! Maps a [`ResolvedIdentity`] onto a local account. Strategies run in order
//! and the first hit wins:
//!
//! 1. Existing `(subject, issuer)` binding
//! 2. Email migration (oldest unbound account with the same address)
//! 3. Username migration (account with the canonical candidate name)
//! 4. Provisioning under the first free `base`, `base1`, `base2`, ... name
//!
//! Migrations bind the account immediately; provisioning only picks a name.
//! Writing the new account is left to [`super::session::complete_login`].

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::claims::ResolvedIdentity;
use super::username::{available_username, canonicalize, DEFAULT_USERNAME};
use crate::storage::{IdentityStore, StoreResult, UserId};

/// Site switches for migrating pre-existing accounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct MigrationPolicy {
    pub migrate_users_by_email: bool,
    pub migrate_users_by_username: bool,
    pub use_real_name_as_username: bool,
    pub use_email_as_username: bool,
}

/// How an existing account was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Binding,
    Email,
    Username,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Log in as an existing account.
    Matched {
        user_id: UserId,
        username: String,
        strategy: MatchStrategy,
    },
    /// Create an account under this (currently free) name.
    Provision { username: String },
}

/// Runs the matching cascade against an [`IdentityStore`].
pub struct IdentityResolver<'a, S: IdentityStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: IdentityStore + ?Sized> IdentityResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn resolve(
        &self,
        identity: &ResolvedIdentity,
        policy: &MigrationPolicy,
    ) -> StoreResult<Resolution> {
        let subject = identity.subject();
        let issuer = identity.issuer();

        if let Some(found) = self.store.find_binding_by_subject_issuer(subject, issuer)? {
            tracing::debug!(
                user_id = found.user_id,
                subject,
                issuer,
                "Matched existing binding"
            );
            return Ok(Resolution::Matched {
                user_id: found.user_id,
                username: found.username,
                strategy: MatchStrategy::Binding,
            });
        }

        if policy.migrate_users_by_email && !identity.email_address().is_empty() {
            match self
                .store
                .find_oldest_unbound_user_by_email(identity.email_address())?
            {
                Some(found) => {
                    self.store.upsert_binding(found.user_id, subject, issuer)?;
                    tracing::info!(
                        user_id = found.user_id,
                        username = %found.username,
                        issuer,
                        "Migrated account by email"
                    );
                    return Ok(Resolution::Matched {
                        user_id: found.user_id,
                        username: found.username,
                        strategy: MatchStrategy::Email,
                    });
                }
                None => tracing::debug!(issuer, "No unbound account for email"),
            }
        }

        let candidate = candidate_username(identity, policy);

        if policy.migrate_users_by_username {
            if let Some(name) = candidate.as_deref() {
                match self.store.find_legacy_user_by_username(name)? {
                    Some(user_id) => {
                        self.store.upsert_binding(user_id, subject, issuer)?;
                        tracing::info!(
                            user_id,
                            username = %name,
                            issuer,
                            "Migrated account by username"
                        );
                        return Ok(Resolution::Matched {
                            user_id,
                            username: name.to_string(),
                            strategy: MatchStrategy::Username,
                        });
                    }
                    None => tracing::debug!(username = %name, "No account with candidate name"),
                }
            }
        }

        let base = candidate.as_deref().unwrap_or(DEFAULT_USERNAME);
        let username = available_username(self.store, base)?;
        tracing::debug!(%username, subject, issuer, "No match, provisioning");
        Ok(Resolution::Provision { username })
    }
}

/// Canonical local name to migrate to or provision under, if one can be derived.
fn candidate_username(identity: &ResolvedIdentity, policy: &MigrationPolicy) -> Option<String> {
    let raw = if let Some(explicit) = identity.explicit_username() {
        Some(explicit.to_string())
    } else if policy.use_real_name_as_username && !identity.full_name().is_empty() {
        Some(identity.full_name())
    } else if policy.use_email_as_username && identity.email_local_part().is_some() {
        identity.email_local_part().map(str::to_string)
    } else {
        identity.username()
    }?;

    match canonicalize(&raw) {
        Ok(name) => Some(name),
        Err(e) => {
            tracing::debug!(candidate = %raw, error = %e, "Unusable username candidate");
            None
        }
    }
}
