// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Validated token-verification settings.
//!
//! [`Settings`] is built once at startup from [`crate::config::AppConfig`] and
//! shared read-only (behind an `Arc`) by every request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::groups::GroupMapping;

/// Default name of the claim carrying the user's source groups.
pub const DEFAULT_GROUPS_CLAIM: &str = "groups";

/// Default clock skew tolerance for `exp`/`nbf`/`iat` (60 seconds).
pub const DEFAULT_LEEWAY_SECONDS: u64 = 60;

/// Signing algorithms accepted for inbound tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum SigningAlgorithm {
    HS256,
    RS256,
    EdDSA,
}

impl SigningAlgorithm {
    pub const SUPPORTED: [SigningAlgorithm; 3] = [
        SigningAlgorithm::HS256,
        SigningAlgorithm::RS256,
        SigningAlgorithm::EdDSA,
    ];

    /// The matching `jsonwebtoken` algorithm.
    pub fn jwt_algorithm(&self) -> jsonwebtoken::Algorithm {
        match self {
            SigningAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            SigningAlgorithm::RS256 => jsonwebtoken::Algorithm::RS256,
            SigningAlgorithm::EdDSA => jsonwebtoken::Algorithm::EdDSA,
        }
    }
}

impl FromStr for SigningAlgorithm {
    type Err = SettingsError;

    /// Names are matched exactly (`HS256`, `RS256`, `EdDSA`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::SUPPORTED
            .into_iter()
            .find(|alg| alg.to_string() == s)
            .ok_or_else(|| SettingsError::UnsupportedAlgorithm(s.to_string()))
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningAlgorithm::HS256 => write!(f, "HS256"),
            SigningAlgorithm::RS256 => write!(f, "RS256"),
            SigningAlgorithm::EdDSA => write!(f, "EdDSA"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("JWT algorithm is required")]
    MissingAlgorithm,

    #[error("JWT key is required")]
    MissingKey,

    #[error("JWT algorithm must be one of HS256, RS256, EdDSA, but was found to be \"{0}\"")]
    UnsupportedAlgorithm(String),

    #[error("groups claim name must not be empty")]
    EmptyGroupsClaimName,
}

/// Immutable token-verification settings.
#[derive(Clone)]
pub struct Settings {
    algorithm: SigningAlgorithm,
    key: String,
    required_claims: Vec<String>,
    group_mapping: GroupMapping,
    groups_claim_name: String,
    leeway_seconds: u64,
}

impl Settings {
    /// Validate and build settings.
    ///
    /// A missing group mapping is treated as an empty table and a missing
    /// groups claim name falls back to [`DEFAULT_GROUPS_CLAIM`].
    pub fn new(
        algorithm: &str,
        key: impl Into<String>,
        required_claims: Vec<String>,
        group_mapping: Option<GroupMapping>,
        groups_claim_name: Option<String>,
    ) -> Result<Self, SettingsError> {
        if algorithm.is_empty() {
            return Err(SettingsError::MissingAlgorithm);
        }
        let key = key.into();
        if key.is_empty() {
            return Err(SettingsError::MissingKey);
        }
        let algorithm = algorithm.parse::<SigningAlgorithm>()?;

        let groups_claim_name =
            groups_claim_name.unwrap_or_else(|| DEFAULT_GROUPS_CLAIM.to_string());
        if groups_claim_name.is_empty() {
            return Err(SettingsError::EmptyGroupsClaimName);
        }

        Ok(Self {
            algorithm,
            key,
            required_claims: required_claims
                .into_iter()
                .filter(|claim| !claim.is_empty())
                .collect(),
            group_mapping: group_mapping.unwrap_or_default(),
            groups_claim_name,
            leeway_seconds: DEFAULT_LEEWAY_SECONDS,
        })
    }

    /// Override the clock skew tolerance.
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Site-specific claims that must be present on every token.
    pub fn required_claims(&self) -> &[String] {
        &self.required_claims
    }

    pub fn group_mapping(&self) -> &GroupMapping {
        &self.group_mapping
    }

    pub fn groups_claim_name(&self) -> &str {
        &self.groups_claim_name
    }

    pub fn leeway_seconds(&self) -> u64 {
        self.leeway_seconds
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("algorithm", &self.algorithm)
            .field("key", &"<redacted>")
            .field("required_claims", &self.required_claims)
            .field("group_mapping", &self.group_mapping)
            .field("groups_claim_name", &self.groups_claim_name)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn initialize_keeps_values() {
        let mapping: GroupMapping = [("admin", "sysop")].into_iter().collect();
        let settings = Settings::new(
            "HS256",
            "secret",
            claims(&["sub", "exp"]),
            Some(mapping.clone()),
            None,
        )
        .unwrap();

        assert_eq!(settings.algorithm(), SigningAlgorithm::HS256);
        assert_eq!(settings.key(), "secret");
        assert_eq!(settings.required_claims(), claims(&["sub", "exp"]).as_slice());
        assert_eq!(settings.group_mapping(), &mapping);
        assert_eq!(settings.groups_claim_name(), DEFAULT_GROUPS_CLAIM);
        assert_eq!(settings.leeway_seconds(), DEFAULT_LEEWAY_SECONDS);
    }

    #[test]
    fn rejects_unsupported_algorithm() {
        let err = Settings::new("invalid", "secret", vec![], None, None).unwrap_err();
        assert_eq!(err, SettingsError::UnsupportedAlgorithm("invalid".to_string()));
    }

    #[test]
    fn algorithm_names_are_case_sensitive() {
        assert!(Settings::new("hs256", "secret", vec![], None, None).is_err());
        assert_eq!(
            "EdDSA".parse::<SigningAlgorithm>().unwrap(),
            SigningAlgorithm::EdDSA
        );
    }

    #[test]
    fn rejects_empty_algorithm_and_key() {
        assert_eq!(
            Settings::new("", "secret", vec![], None, None).unwrap_err(),
            SettingsError::MissingAlgorithm
        );
        assert_eq!(
            Settings::new("HS256", "", vec![], None, None).unwrap_err(),
            SettingsError::MissingKey
        );
    }

    #[test]
    fn missing_group_mapping_defaults_to_empty() {
        let settings = Settings::new("RS256", "pem", vec![], None, None).unwrap();
        assert!(settings.group_mapping().is_empty());
    }

    #[test]
    fn custom_groups_claim_and_leeway() {
        let settings = Settings::new("HS256", "k", vec![], None, Some("roles".to_string()))
            .unwrap()
            .with_leeway(5);
        assert_eq!(settings.groups_claim_name(), "roles");
        assert_eq!(settings.leeway_seconds(), 5);

        let err = Settings::new("HS256", "k", vec![], None, Some(String::new())).unwrap_err();
        assert_eq!(err, SettingsError::EmptyGroupsClaimName);
    }

    #[test]
    fn debug_output_redacts_key() {
        let settings = Settings::new("HS256", "top-secret", vec![], None, None).unwrap();
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("top-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
