// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Token login for accounts managed by an external identity provider.
//!
//! ## Login Flow
//!
//! 1. Client sends `Authorization: Bearer <JWT>` (or the same value as a
//!    form field)
//! 2. The credential is normalized and decoded with the configured
//!    algorithm and key:
//!    - signature, `exp`, `nbf`, `iat` checked with clock-skew leeway
//!    - `preferred_username`, `iss`, `aud`, `sub` and every site-required
//!      claim must be non-empty
//! 3. Claims are mapped to a [`ResolvedIdentity`], including local groups
//!    to add and remove
//! 4. The [`IdentityResolver`] finds or names the local account
//! 5. [`complete_login`] persists the result and opens a session
//!
//! ## Security
//!
//! - Exactly one algorithm is accepted per deployment
//! - Audience and issuer values are not constrained; the binding is keyed
//!   on `(subject, issuer)` so identities from different issuers never
//!   collide
//! - Clock skew tolerance defaults to 60 seconds

pub mod claims;
pub mod decoder;
pub mod error;
pub mod extractor;
pub mod groups;
pub mod normalize;
pub mod resolver;
pub mod session;
pub mod settings;
pub mod username;

pub use claims::{IdentityClaims, ResolvedIdentity, ResolvedIdentityBuilder};
pub use decoder::TokenDecoder;
pub use error::AuthError;
pub use extractor::RawCredential;
pub use groups::{GroupAssignment, GroupMapping};
pub use normalize::normalize;
pub use resolver::{IdentityResolver, MatchStrategy, MigrationPolicy, Resolution};
pub use session::{complete_login, LoginOutcome};
pub use settings::{Settings, SettingsError, SigningAlgorithm};
