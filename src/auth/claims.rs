// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decoded JWT claims and the resolved identity built from them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::groups::GroupAssignment;
use super::settings::Settings;

/// Canonical claim names.
pub mod claim {
    pub const USERNAME: &str = "preferred_username";
    pub const EMAIL: &str = "email";
    pub const FIRST_NAME: &str = "given_name";
    pub const LAST_NAME: &str = "family_name";
    pub const ISSUER: &str = "iss";
    pub const AUDIENCE: &str = "aud";
    pub const SUBJECT: &str = "sub";
    pub const EXTERNAL_ID: &str = "ID";
    pub const ISSUED_AT: &str = "iat";
}

/// Claims every token must carry, non-empty.
pub const EXTENSION_REQUIRED_CLAIMS: [&str; 4] =
    [claim::USERNAME, claim::ISSUER, claim::AUDIENCE, claim::SUBJECT];

/// Raw claim set as produced by the decoder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityClaims(Map<String, Value>);

impl IdentityClaims {
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Whether the claim exists and carries a non-empty value.
    pub fn is_present(&self, name: &str) -> bool {
        self.0.get(name).is_some_and(|value| !is_empty_value(value))
    }

    /// Claim rendered as a string, or `""` when absent.
    pub fn string(&self, name: &str) -> String {
        self.0.get(name).map(render_value).unwrap_or_default()
    }

    /// Claim as an integer timestamp, when it is numeric.
    pub fn timestamp(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(|value| {
            value
                .as_i64()
                .or_else(|| value.as_f64().map(|f| f as i64))
        })
    }

    /// Names of `claims` that are missing or empty here.
    pub fn missing<'a>(&self, claims: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        claims
            .into_iter()
            .filter(|name| !self.is_present(name))
            .collect()
    }
}

/// Whether a claim value counts as not asserted.
///
/// Absent-equivalent values are null, `false`, `""`, `[]` and `{}`. Numbers
/// are always present, and so is the string `"0"`; a subject of `0` or
/// `"0"` is a real identifier.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Number(_) => false,
    }
}

/// Strings verbatim, arrays joined with `,`, everything else as JSON text.
fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

/// Upper-case the first character, leaving the rest untouched.
pub fn capitalize_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Identity extracted from a verified token.
///
/// Only constructed through [`ResolvedIdentityBuilder`]; read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ResolvedIdentity {
    #[serde(rename = "preferred_username")]
    explicit_username: Option<String>,
    first_name: String,
    last_name: String,
    email_address: String,
    issuer: String,
    audience: String,
    subject: String,
    external_user_id: String,
    groups: BTreeSet<String>,
    groups_to_remove: BTreeSet<String>,
}

impl ResolvedIdentity {
    pub fn builder() -> ResolvedIdentityBuilder {
        ResolvedIdentityBuilder::default()
    }

    /// Project a validated claim set into an identity.
    pub fn from_claims(claims: &IdentityClaims, settings: &Settings) -> Self {
        let source_groups = claims.string(settings.groups_claim_name());

        ResolvedIdentity::builder()
            .username(claims.string(claim::USERNAME))
            .email_address(claims.string(claim::EMAIL))
            .external_user_id(claims.string(claim::EXTERNAL_ID))
            .first_name(claims.string(claim::FIRST_NAME))
            .last_name(claims.string(claim::LAST_NAME))
            .issuer(claims.string(claim::ISSUER))
            .audience(claims.string(claim::AUDIENCE))
            .subject(claims.string(claim::SUBJECT))
            .groups(settings.group_mapping().resolve(&source_groups))
            .build()
    }

    /// Local username derived from the claims.
    ///
    /// Explicit claim, then the local part of the email address, then first
    /// and last name concatenated; the first character is upper-cased.
    pub fn username(&self) -> Option<String> {
        if let Some(explicit) = &self.explicit_username {
            return Some(capitalize_first(explicit));
        }
        if let Some(local) = self.email_local_part() {
            return Some(capitalize_first(local));
        }
        let joined = format!("{}{}", self.first_name, self.last_name);
        (!joined.is_empty()).then(|| capitalize_first(&joined))
    }

    /// Raw `preferred_username` claim, if it was asserted.
    pub fn explicit_username(&self) -> Option<&str> {
        self.explicit_username.as_deref()
    }

    /// Part of the email address before `@`, if non-empty.
    pub fn email_local_part(&self) -> Option<&str> {
        self.email_address
            .split_once('@')
            .map(|(local, _)| local)
            .filter(|local| !local.is_empty())
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    /// `"first last"`, trimmed; empty when neither is known.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn email_address(&self) -> &str {
        &self.email_address
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn external_user_id(&self) -> &str {
        &self.external_user_id
    }

    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    pub fn groups_to_remove(&self) -> &BTreeSet<String> {
        &self.groups_to_remove
    }
}

/// Incremental builder for [`ResolvedIdentity`].
#[derive(Debug, Default)]
pub struct ResolvedIdentityBuilder {
    inner: ResolvedIdentity,
}

impl ResolvedIdentityBuilder {
    /// Empty values leave the username to be derived from other claims.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        let username = username.into();
        self.inner.explicit_username = (!username.is_empty()).then_some(username);
        self
    }

    pub fn first_name(mut self, first_name: impl Into<String>) -> Self {
        self.inner.first_name = first_name.into();
        self
    }

    pub fn last_name(mut self, last_name: impl Into<String>) -> Self {
        self.inner.last_name = last_name.into();
        self
    }

    /// Addresses without `@` are dropped silently.
    pub fn email_address(mut self, email_address: impl Into<String>) -> Self {
        let email_address = email_address.into();
        self.inner.email_address = if email_address.contains('@') {
            email_address
        } else {
            String::new()
        };
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.inner.issuer = issuer.into();
        self
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.inner.audience = audience.into();
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.inner.subject = subject.into();
        self
    }

    pub fn external_user_id(mut self, external_user_id: impl Into<String>) -> Self {
        self.inner.external_user_id = external_user_id.into();
        self
    }

    pub fn groups(mut self, assignment: GroupAssignment) -> Self {
        self.inner.groups = assignment.groups;
        self.inner.groups_to_remove = assignment.groups_to_remove;
        self
    }

    pub fn build(self) -> ResolvedIdentity {
        self.inner
    }
}
