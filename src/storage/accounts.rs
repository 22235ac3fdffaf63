// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded account database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `accounts`: user_id → serialized LocalAccount
//! - `account_names`: username → user_id (unique)
//! - `bindings`: user_id → serialized SubjectIssuerBinding (one per account)
//! - `binding_index`: `issuer \0 subject` → user_id
//! - `sessions`: session_id → serialized SessionRecord
//! - `meta`: key → value (id counter)

use std::collections::BTreeSet;
use std::path::Path;

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};

use super::{
    AccountRef, IdentityStore, LocalAccount, NewAccount, SessionRecord, StoreError, StoreResult,
    SubjectIssuerBinding, UserId,
};

// =============================================================================
// Table Definitions
// =============================================================================

const ACCOUNTS: TableDefinition<u64, &[u8]> = TableDefinition::new("accounts");

const ACCOUNT_NAMES: TableDefinition<&str, u64> = TableDefinition::new("account_names");

const BINDINGS: TableDefinition<u64, &[u8]> = TableDefinition::new("bindings");

const BINDING_INDEX: TableDefinition<&str, u64> = TableDefinition::new("binding_index");

const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_ACCOUNT_ID: &str = "next_account_id";

/// Composite lookup key for a `(subject, issuer)` pair.
fn binding_key(subject: &str, issuer: &str) -> String {
    format!("{issuer}\u{0}{subject}")
}

// =============================================================================
// AccountDatabase
// =============================================================================

/// Embedded ACID account database.
pub struct AccountDatabase {
    db: Database,
}

impl AccountDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ACCOUNTS)?;
            let _ = write_txn.open_table(ACCOUNT_NAMES)?;
            let _ = write_txn.open_table(BINDINGS)?;
            let _ = write_txn.open_table(BINDING_INDEX)?;
            let _ = write_txn.open_table(SESSIONS)?;
            let _ = write_txn.open_table(META)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Cheap read to confirm the database is usable.
    pub fn ping(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(META)?;
        Ok(())
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Create an account; fails with `Conflict` when the name is taken.
    pub fn create_account(&self, account: &NewAccount) -> StoreResult<LocalAccount> {
        let write_txn = self.db.begin_write()?;
        let created = insert_account(&write_txn, account, &BTreeSet::new())?;
        write_txn.commit()?;
        Ok(created)
    }

    pub fn get_account(&self, user_id: UserId) -> StoreResult<Option<LocalAccount>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Login completion
    // =========================================================================

    /// Create an account with its groups and binding in one transaction.
    ///
    /// Returns `Conflict` without writing anything when the name is taken or
    /// the `(subject, issuer)` pair was bound in the meantime.
    pub fn provision_account(
        &self,
        account: &NewAccount,
        subject: &str,
        issuer: &str,
        groups: &BTreeSet<String>,
    ) -> StoreResult<LocalAccount> {
        let write_txn = self.db.begin_write()?;
        {
            let index = write_txn.open_table(BINDING_INDEX)?;
            if index.get(binding_key(subject, issuer).as_str())?.is_some() {
                return Err(StoreError::Conflict(format!(
                    "subject {subject} of issuer {issuer} is already bound"
                )));
            }
        }
        let created = insert_account(&write_txn, account, groups)?;
        upsert_binding_in(&write_txn, created.id, subject, issuer)?;
        write_txn.commit()?;

        tracing::info!(
            user_id = created.id,
            username = %created.name,
            "Provisioned account"
        );
        Ok(created)
    }

    /// Re-save the binding and reconcile groups of an existing account.
    pub fn record_login(
        &self,
        user_id: UserId,
        subject: &str,
        issuer: &str,
        groups: &BTreeSet<String>,
        groups_to_remove: &BTreeSet<String>,
    ) -> StoreResult<LocalAccount> {
        let write_txn = self.db.begin_write()?;
        let account = {
            let mut accounts = write_txn.open_table(ACCOUNTS)?;
            let mut account: LocalAccount = {
                let existing = accounts
                    .get(user_id)?
                    .ok_or_else(|| StoreError::NotFound(format!("Account {user_id}")))?;
                serde_json::from_slice(existing.value())?
            };

            account.groups.extend(groups.iter().cloned());
            account.groups.retain(|group| !groups_to_remove.contains(group));

            let json = serde_json::to_vec(&account)?;
            accounts.insert(user_id, json.as_slice())?;
            account
        };
        upsert_binding_in(&write_txn, user_id, subject, issuer)?;
        write_txn.commit()?;
        Ok(account)
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    pub fn create_session(&self, user_id: UserId) -> StoreResult<SessionRecord> {
        let session = SessionRecord {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id,
            created_at: Utc::now(),
        };
        let json = serde_json::to_vec(&session)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSIONS)?;
            table.insert(session.session_id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(session)
    }
}


/// Read-back lookups used to assert on stored state.
#[cfg(test)]
impl AccountDatabase {
    pub(crate) fn find_account_by_name(&self, name: &str) -> StoreResult<Option<LocalAccount>> {
        match self.find_legacy_user_by_username(name)? {
            Some(user_id) => self.get_account(user_id),
            None => Ok(None),
        }
    }

    pub(crate) fn get_binding(&self, user_id: UserId) -> StoreResult<Option<SubjectIssuerBinding>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BINDINGS)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub(crate) fn get_session(&self, session_id: &str) -> StoreResult<Option<SessionRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSIONS)?;
        match table.get(session_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Index `(subject, issuer)` to `user_id` without an account or binding row.
    pub(crate) fn index_binding_without_account(
        &self,
        subject: &str,
        issuer: &str,
        user_id: UserId,
    ) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut index = write_txn.open_table(BINDING_INDEX)?;
            index.insert(binding_key(subject, issuer).as_str(), user_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl IdentityStore for AccountDatabase {
    fn find_binding_by_subject_issuer(
        &self,
        subject: &str,
        issuer: &str,
    ) -> StoreResult<Option<AccountRef>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(BINDING_INDEX)?;
        let Some(user_id) = index
            .get(binding_key(subject, issuer).as_str())?
            .map(|v| v.value())
        else {
            return Ok(None);
        };

        let accounts = read_txn.open_table(ACCOUNTS)?;
        match accounts.get(user_id)? {
            Some(value) => {
                let account: LocalAccount = serde_json::from_slice(value.value())?;
                Ok(Some(AccountRef {
                    user_id,
                    username: account.name,
                }))
            }
            None => {
                tracing::warn!(user_id, "Binding points at a missing account");
                Ok(None)
            }
        }
    }

    fn find_oldest_unbound_user_by_email(&self, email: &str) -> StoreResult<Option<AccountRef>> {
        let read_txn = self.db.begin_read()?;
        let accounts = read_txn.open_table(ACCOUNTS)?;
        let bindings = read_txn.open_table(BINDINGS)?;

        let mut oldest: Option<LocalAccount> = None;
        for entry in accounts.iter()? {
            let (_, value) = entry?;
            let account: LocalAccount = serde_json::from_slice(value.value())?;
            if account.email != email || bindings.get(account.id)?.is_some() {
                continue;
            }
            // None sorts before Some: untracked registrations count as oldest.
            let is_older = oldest.as_ref().is_none_or(|current| {
                (account.registered_at, account.id) < (current.registered_at, current.id)
            });
            if is_older {
                oldest = Some(account);
            }
        }

        Ok(oldest.map(|account| AccountRef {
            user_id: account.id,
            username: account.name,
        }))
    }

    fn find_legacy_user_by_username(&self, username: &str) -> StoreResult<Option<UserId>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNT_NAMES)?;
        Ok(table.get(username)?.map(|v| v.value()))
    }

    fn upsert_binding(&self, user_id: UserId, subject: &str, issuer: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let accounts = write_txn.open_table(ACCOUNTS)?;
            if accounts.get(user_id)?.is_none() {
                return Err(StoreError::NotFound(format!("Account {user_id}")));
            }
        }
        upsert_binding_in(&write_txn, user_id, subject, issuer)?;
        write_txn.commit()?;
        Ok(())
    }

    fn username_exists(&self, username: &str) -> StoreResult<bool> {
        Ok(self.find_legacy_user_by_username(username)?.is_some())
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================

fn insert_account(
    txn: &WriteTransaction,
    account: &NewAccount,
    groups: &BTreeSet<String>,
) -> StoreResult<LocalAccount> {
    let mut names = txn.open_table(ACCOUNT_NAMES)?;
    if names.get(account.name.as_str())?.is_some() {
        return Err(StoreError::Conflict(format!(
            "username {} is already taken",
            account.name
        )));
    }

    let mut meta = txn.open_table(META)?;
    let id = meta.get(NEXT_ACCOUNT_ID)?.map(|v| v.value()).unwrap_or(1);
    meta.insert(NEXT_ACCOUNT_ID, id + 1)?;

    let created = LocalAccount {
        id,
        name: account.name.clone(),
        real_name: account.real_name.clone(),
        email: account.email.clone(),
        registered_at: account.registered_at,
        groups: groups.clone(),
    };

    let json = serde_json::to_vec(&created)?;
    let mut accounts = txn.open_table(ACCOUNTS)?;
    accounts.insert(id, json.as_slice())?;
    names.insert(account.name.as_str(), id)?;

    Ok(created)
}

/// Replace the binding of `user_id`, keeping the lookup index in step.
fn upsert_binding_in(
    txn: &WriteTransaction,
    user_id: UserId,
    subject: &str,
    issuer: &str,
) -> StoreResult<()> {
    let mut bindings = txn.open_table(BINDINGS)?;
    let mut index = txn.open_table(BINDING_INDEX)?;

    let previous: Option<SubjectIssuerBinding> = match bindings.get(user_id)? {
        Some(value) => Some(serde_json::from_slice(value.value())?),
        None => None,
    };
    if let Some(previous) = previous {
        let old_key = binding_key(&previous.subject, &previous.issuer);
        let points_here = index.get(old_key.as_str())?.map(|v| v.value()) == Some(user_id);
        if points_here {
            index.remove(old_key.as_str())?;
        }
    }

    let binding = SubjectIssuerBinding {
        user_id,
        subject: subject.to_string(),
        issuer: issuer.to_string(),
    };
    let json = serde_json::to_vec(&binding)?;
    bindings.insert(user_id, json.as_slice())?;
    index.insert(binding_key(subject, issuer).as_str(), user_id)?;

    tracing::debug!(user_id, subject, issuer, "Saved subject/issuer binding");
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
