// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity-provider group mapping.
//!
//! The mapping table translates source-system group names (as asserted in the
//! token's groups claim) into local group names. Resolution is a
//! reconciliation, not a grant: every local group reachable through *some*
//! mapping entry but not asserted for this user ends up in
//! [`GroupAssignment::groups_to_remove`].
//!
//! ```text
//! { "idp-admins": ["sysop", "bureaucrat"], "idp-editors": "editor" }
//!
//! "idp-editors"  ->  groups = {editor}, groups_to_remove = {bureaucrat, sysop}
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Target side of a mapping entry: one group name or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupTargets {
    One(String),
    Many(Vec<String>),
}

impl GroupTargets {
    /// Iterate over the local group names of this entry.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let names: &[String] = match self {
            GroupTargets::One(name) => std::slice::from_ref(name),
            GroupTargets::Many(names) => names.as_slice(),
        };
        names.iter().map(String::as_str)
    }
}

impl From<&str> for GroupTargets {
    fn from(name: &str) -> Self {
        GroupTargets::One(name.to_string())
    }
}

impl From<Vec<&str>> for GroupTargets {
    fn from(names: Vec<&str>) -> Self {
        GroupTargets::Many(names.into_iter().map(str::to_string).collect())
    }
}

/// Source group name → local group name(s).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupMapping(BTreeMap<String, GroupTargets>);

/// Result of resolving a groups claim against the mapping table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GroupAssignment {
    /// Local groups the user must be a member of.
    pub groups: BTreeSet<String>,
    /// Mapped local groups the user must not be a member of.
    pub groups_to_remove: BTreeSet<String>,
}

impl GroupMapping {
    /// Parse a mapping table from its JSON object form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// De-duplicated union of every local group named anywhere in the table.
    pub fn all_target_groups(&self) -> BTreeSet<String> {
        self.0
            .values()
            .flat_map(GroupTargets::names)
            .map(str::to_string)
            .collect()
    }

    /// Resolve a comma-separated list of source groups.
    ///
    /// Source names are matched exactly; an empty claim yields a single empty
    /// source name, which only matches an entry keyed by `""`.
    pub fn resolve(&self, source_groups: &str) -> GroupAssignment {
        let groups: BTreeSet<String> = source_groups
            .split(',')
            .filter_map(|source| self.0.get(source))
            .flat_map(GroupTargets::names)
            .map(str::to_string)
            .collect();

        let groups_to_remove = self
            .all_target_groups()
            .difference(&groups)
            .cloned()
            .collect();

        GroupAssignment {
            groups,
            groups_to_remove,
        }
    }
}

impl<K: Into<String>, V: Into<GroupTargets>> FromIterator<(K, V)> for GroupMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(source, targets)| (source.into(), targets.into()))
                .collect(),
        )
    }
}
