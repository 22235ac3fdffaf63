// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Applies a [`Resolution`] to the account store and opens a session.

use super::claims::ResolvedIdentity;
use super::resolver::{MatchStrategy, Resolution};
use crate::storage::{AccountDatabase, LocalAccount, NewAccount, StoreResult};

/// Result of a completed login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub account: LocalAccount,
    /// True when the account was provisioned by this login.
    pub created: bool,
    /// `None` for provisioned accounts.
    pub strategy: Option<MatchStrategy>,
    pub session_id: String,
}

/// Persist the login: provision or reconcile, save the binding, open a session.
///
/// Provisioning surfaces [`crate::storage::StoreError::Conflict`] when the
/// chosen name or the external identity was claimed concurrently; the caller
/// re-runs resolution in that case.
pub fn complete_login(
    db: &AccountDatabase,
    identity: &ResolvedIdentity,
    resolution: Resolution,
) -> StoreResult<LoginOutcome> {
    let (account, created, strategy) = match resolution {
        Resolution::Provision { username } => {
            let new_account = NewAccount::named(username)
                .with_real_name(identity.full_name())
                .with_email(identity.email_address());
            let account = db.provision_account(
                &new_account,
                identity.subject(),
                identity.issuer(),
                identity.groups(),
            )?;
            (account, true, None)
        }
        Resolution::Matched {
            user_id, strategy, ..
        } => {
            let account = db.record_login(
                user_id,
                identity.subject(),
                identity.issuer(),
                identity.groups(),
                identity.groups_to_remove(),
            )?;
            (account, false, Some(strategy))
        }
    };

    let session = db.create_session(account.id)?;
    tracing::info!(
        user_id = account.id,
        username = %account.name,
        created,
        ?strategy,
        "Login completed"
    );

    Ok(LoginOutcome {
        account,
        created,
        strategy,
        session_id: session.session_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::groups::{GroupMapping, GroupTargets};
    use crate::auth::resolver::{IdentityResolver, MigrationPolicy};
    use crate::storage::{IdentityStore, StoreError};
    use std::collections::BTreeSet;

    fn temp_db() -> (AccountDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = AccountDatabase::open(&dir.path().join("accounts.redb")).unwrap();
        (db, dir)
    }

    fn mapping() -> GroupMapping {
        [
            ("admins", GroupTargets::from(vec!["sysop", "bureaucrat"])),
            ("staff", GroupTargets::from("editor")),
        ]
        .into_iter()
        .collect()
    }

    fn identity(groups_claim: &str) -> ResolvedIdentity {
        ResolvedIdentity::builder()
            .username("alice")
            .first_name("Alice")
            .last_name("Liddell")
            .email_address("alice@example.com")
            .issuer("idp1")
            .subject("sub-a")
            .groups(mapping().resolve(groups_claim))
            .build()
    }

    fn login(db: &AccountDatabase, identity: &ResolvedIdentity) -> StoreResult<LoginOutcome> {
        let resolution =
            IdentityResolver::new(db).resolve(identity, &MigrationPolicy::default())?;
        complete_login(db, identity, resolution)
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn first_login_provisions_account_with_groups() {
        let (db, _dir) = temp_db();
        let outcome = login(&db, &identity("admins")).unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.strategy, None);
        assert_eq!(outcome.account.name, "Alice");
        assert_eq!(outcome.account.real_name, "Alice Liddell");
        assert_eq!(outcome.account.email, "alice@example.com");
        assert_eq!(outcome.account.groups, set(&["bureaucrat", "sysop"]));
        assert!(db.get_session(&outcome.session_id).unwrap().is_some());
        assert_eq!(
            db.find_binding_by_subject_issuer("sub-a", "idp1")
                .unwrap()
                .unwrap()
                .user_id,
            outcome.account.id
        );
    }

    #[test]
    fn second_login_reconciles_groups() {
        let (db, _dir) = temp_db();
        let first = login(&db, &identity("admins")).unwrap();
        let second = login(&db, &identity("staff")).unwrap();

        assert!(!second.created);
        assert_eq!(second.strategy, Some(MatchStrategy::Binding));
        assert_eq!(second.account.id, first.account.id);
        assert_eq!(second.account.groups, set(&["editor"]));
        assert_ne!(second.session_id, first.session_id);
    }

    #[test]
    fn unmapped_groups_survive_reconciliation() {
        let (db, _dir) = temp_db();
        let first = login(&db, &identity("")).unwrap();
        db.record_login(
            first.account.id,
            "sub-a",
            "idp1",
            &set(&["local-only"]),
            &BTreeSet::new(),
        )
        .unwrap();

        let second = login(&db, &identity("")).unwrap();
        assert_eq!(second.account.groups, set(&["local-only"]));
    }

    #[test]
    fn stale_provision_is_a_conflict() {
        let (db, _dir) = temp_db();
        let id = identity("");
        let stale = IdentityResolver::new(&db)
            .resolve(&id, &MigrationPolicy::default())
            .unwrap();
        login(&db, &id).unwrap();

        let err = complete_login(&db, &id, stale).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
