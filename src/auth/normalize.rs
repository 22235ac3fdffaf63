// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer credential normalization.

/// Recognized credential prefixes, in priority order.
const BEARER_PREFIXES: [&str; 2] = ["Bearer:", "Bearer "];

/// Strip transport framing from a raw credential.
///
/// Returns an empty string when the value carries neither `Bearer:` nor
/// `Bearer ` as a literal prefix; callers treat that as "no credential".
/// Otherwise every occurrence of both prefixes is removed, followed by every
/// whitespace character.
pub fn normalize(raw: &str) -> String {
    if !BEARER_PREFIXES.iter().any(|prefix| raw.starts_with(prefix)) {
        tracing::debug!("Credential does not start with a Bearer prefix");
        return String::new();
    }

    let stripped = BEARER_PREFIXES
        .iter()
        .fold(raw.to_string(), |acc, prefix| acc.replace(prefix, ""));

    stripped.chars().filter(|c| !c.is_whitespace()).collect()
}
