// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Account Storage
//!
//! Local accounts, subject/issuer bindings, and login sessions live in a
//! single embedded redb database under `DATA_DIR`.
//!
//! ## Consistency
//!
//! - A binding is keyed by the local user ID: one binding per account,
//!   upserted on every login.
//! - Usernames are unique; provisioning checks the name and the
//!   `(subject, issuer)` pair inside the same write transaction and reports
//!   [`StoreError::Conflict`] instead of writing a duplicate.
//! - redb serializes write transactions, so multi-row updates (account +
//!   groups + binding) are all-or-nothing.

pub mod accounts;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use accounts::AccountDatabase;

/// Local account identifier.
pub type UserId = u64;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A local account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LocalAccount {
    pub id: UserId,
    pub name: String,
    pub real_name: String,
    pub email: String,
    /// `None` for accounts that predate registration tracking
    pub registered_at: Option<DateTime<Utc>>,
    pub groups: BTreeSet<String>,
}

/// Fields for creating an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub name: String,
    pub real_name: String,
    pub email: String,
    pub registered_at: Option<DateTime<Utc>>,
}

impl NewAccount {
    /// Account registered now, with no real name or email.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            real_name: String::new(),
            email: String::new(),
            registered_at: Some(Utc::now()),
        }
    }

    pub fn with_real_name(mut self, real_name: impl Into<String>) -> Self {
        self.real_name = real_name.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn registered_at(mut self, registered_at: Option<DateTime<Utc>>) -> Self {
        self.registered_at = registered_at;
        self
    }
}

/// Persisted association between a local account and an external identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectIssuerBinding {
    pub user_id: UserId,
    pub subject: String,
    pub issuer: String,
}

/// Account located by a store lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRef {
    pub user_id: UserId,
    pub username: String,
}

/// An authenticated session opened after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Store operations the identity resolver depends on.
pub trait IdentityStore {
    /// Account bound to exactly this `(subject, issuer)` pair.
    fn find_binding_by_subject_issuer(
        &self,
        subject: &str,
        issuer: &str,
    ) -> StoreResult<Option<AccountRef>>;

    /// Earliest-registered account with this email and no binding of any
    /// issuer. Accounts without a registration timestamp sort first.
    fn find_oldest_unbound_user_by_email(&self, email: &str) -> StoreResult<Option<AccountRef>>;

    /// Account with exactly this name, bound or not.
    fn find_legacy_user_by_username(&self, username: &str) -> StoreResult<Option<UserId>>;

    /// Insert or replace the binding of `user_id`.
    fn upsert_binding(&self, user_id: UserId, subject: &str, issuer: &str) -> StoreResult<()>;

    fn username_exists(&self, username: &str) -> StoreResult<bool>;
}
