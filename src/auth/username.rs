// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local username canonicalization and availability.

use std::net::IpAddr;

use unicode_normalization::UnicodeNormalization;

use super::claims::capitalize_first;
use crate::storage::{IdentityStore, StoreResult};

/// Base name used when no candidate could be derived from the claims.
pub const DEFAULT_USERNAME: &str = "User";

/// Longest accepted username, in bytes.
pub const MAX_USERNAME_BYTES: usize = 255;

/// Characters that may not appear in a local username.
const FORBIDDEN_CHARS: [char; 11] = ['#', '<', '>', '[', ']', '|', '{', '}', '/', '@', ':'];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsernameError {
    #[error("username is empty")]
    Empty,

    #[error("username exceeds 255 bytes")]
    TooLong,

    #[error("username contains forbidden character {0:?}")]
    ForbiddenCharacter(char),

    #[error("username looks like an IP address")]
    IpAddress,
}

/// Turn a claim-derived candidate into a canonical local username.
///
/// NFC-normalizes, treats `_` as a space, collapses runs of whitespace,
/// trims, and upper-cases the first character.
pub fn canonicalize(candidate: &str) -> Result<String, UsernameError> {
    let normalized: String = candidate.nfc().collect::<String>().replace('_', " ");
    let collapsed = normalized.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.is_empty() {
        return Err(UsernameError::Empty);
    }
    if collapsed.len() > MAX_USERNAME_BYTES {
        return Err(UsernameError::TooLong);
    }
    if let Some(c) = collapsed
        .chars()
        .find(|c| c.is_control() || FORBIDDEN_CHARS.contains(c))
    {
        return Err(UsernameError::ForbiddenCharacter(c));
    }
    if collapsed.parse::<IpAddr>().is_ok() {
        return Err(UsernameError::IpAddress);
    }

    Ok(capitalize_first(&collapsed))
}

/// First unused name among `base`, `base1`, `base2`, ...
pub fn available_username<S: IdentityStore + ?Sized>(
    store: &S,
    base: &str,
) -> StoreResult<String> {
    if !store.username_exists(base)? {
        return Ok(base.to_string());
    }

    let mut suffix: u64 = 1;
    loop {
        let digits = suffix.to_string();
        let stem = truncate_bytes(base, MAX_USERNAME_BYTES - digits.len());
        let candidate = format!("{stem}{digits}");
        if !store.username_exists(&candidate)? {
            tracing::debug!(base, %candidate, "Username taken, using suffixed name");
            return Ok(candidate);
        }
        suffix += 1;
    }
}

/// Longest prefix of `value` that fits in `max` bytes, cut on a char boundary.
fn truncate_bytes(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
