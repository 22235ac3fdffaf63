// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational JWT Auth - Token Login & Identity Resolution Service
//!
//! Accepts bearer JWTs issued by an external identity provider, verifies
//! them against a single configured algorithm and key, and maps the
//! asserted identity onto a local account.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token verification, claim mapping and identity resolution
//! - `config` - Environment configuration
//! - `storage` - Accounts, bindings and sessions (redb)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;
pub mod storage;
