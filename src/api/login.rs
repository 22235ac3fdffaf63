// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `POST /v1/login`: exchange a bearer JWT for a local session.

use std::collections::BTreeSet;

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{
    complete_login, normalize, AuthError, IdentityResolver, LoginOutcome, MatchStrategy,
    RawCredential, ResolvedIdentity,
};
use crate::error::{ApiError, ErrorBody};
use crate::state::AppState;
use crate::storage::{StoreError, StoreResult, UserId};

/// Attempts at resolve + persist before a conflict is reported.
const MAX_LOGIN_ATTEMPTS: usize = 3;

/// Successful login.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Always `true`
    pub authenticated: bool,
    pub user_id: UserId,
    pub username: String,
    /// Whether the account was provisioned by this login
    pub created: bool,
    /// How an existing account was matched; absent for new accounts
    pub strategy: Option<MatchStrategy>,
    /// Local groups after reconciliation
    pub groups: BTreeSet<String>,
    pub session_id: String,
    /// Only present when debug mode is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<LoginDebug>,
}

/// Details exposed in debug mode.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct LoginDebug {
    /// Token after normalization
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<ResolvedIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoginDebug {
    fn into_value(self) -> Option<serde_json::Value> {
        serde_json::to_value(self).ok()
    }
}

/// Log in with a bearer JWT.
///
/// The token is read from the `Authorization` header, or from an
/// `Authorization` form field when no header is present.
#[utoipa::path(
    post,
    path = "/v1/login",
    tag = "Login",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 409, description = "Concurrent login could not be resolved", body = ErrorBody),
        (status = 500, description = "Key misconfiguration or store failure", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    RawCredential(raw): RawCredential,
) -> Response {
    let token = raw.as_deref().map(normalize).unwrap_or_default();
    let mut debug = state.debug_mode.then(|| LoginDebug {
        token: token.clone(),
        ..Default::default()
    });

    if token.is_empty() {
        tracing::debug!("Login attempted without a credential");
        return failure(AuthError::MissingCredential.into(), debug);
    }

    let identity = match state.decoder.process(&token) {
        Ok(identity) => identity,
        Err(e) => {
            // Details already logged by the decoder
            if let Some(debug) = debug.as_mut() {
                debug.error = Some(e.to_string());
            }
            return failure(e.into(), debug);
        }
    };
    if let Some(debug) = debug.as_mut() {
        debug.identity = Some(identity.clone());
    }

    match login_with_retry(&state, &identity) {
        Ok(outcome) => {
            let body = LoginResponse {
                authenticated: true,
                user_id: outcome.account.id,
                username: outcome.account.name,
                created: outcome.created,
                strategy: outcome.strategy,
                groups: outcome.account.groups,
                session_id: outcome.session_id,
                debug,
            };
            Json(body).into_response()
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                subject = identity.subject(),
                issuer = identity.issuer(),
                "Login could not be completed"
            );
            if let Some(debug) = debug.as_mut() {
                debug.error = Some(e.to_string());
            }
            failure(e.into(), debug)
        }
    }
}

/// Resolve and persist, re-resolving when a concurrent login won the race.
fn login_with_retry(state: &AppState, identity: &ResolvedIdentity) -> StoreResult<LoginOutcome> {
    retry_on_conflict(|| {
        let resolution = IdentityResolver::new(state.accounts.as_ref())
            .resolve(identity, &state.policy)?;
        complete_login(&state.accounts, identity, resolution)
    })
}

/// Run `attempt` until it succeeds, fails with a non-conflict error, or
/// [`MAX_LOGIN_ATTEMPTS`] is reached.
fn retry_on_conflict<T>(mut attempt: impl FnMut() -> StoreResult<T>) -> StoreResult<T> {
    let mut tries = 1;
    loop {
        match attempt() {
            Err(StoreError::Conflict(reason)) if tries < MAX_LOGIN_ATTEMPTS => {
                tracing::debug!(attempt = tries, %reason, "Login conflict, retrying");
                tries += 1;
            }
            other => return other,
        }
    }
}

fn failure(error: ApiError, debug: Option<LoginDebug>) -> Response {
    error
        .with_debug(debug.and_then(LoginDebug::into_value))
        .into_response()
}
