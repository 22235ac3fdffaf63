// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::AuthError;
use crate::storage::StoreError;

/// Failed login, rendered as an [`ErrorBody`].
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_code: &'static str,
    pub message: String,
    pub debug: Option<serde_json::Value>,
}

/// Body of every failed login response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Always `false`
    pub authenticated: bool,
    pub error: String,
    pub error_code: String,
    /// Only present when debug mode is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub debug: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error_code,
            message: message.into(),
            debug: None,
        }
    }

    pub fn with_debug(mut self, debug: Option<serde_json::Value>) -> Self {
        self.debug = debug;
        self
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        Self::new(error.status_code(), error.error_code(), error.user_message())
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(_) => Self::new(
                StatusCode::CONFLICT,
                "login_conflict",
                "Sorry, another login for this account is in progress. Please try again.",
            ),
            _ => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_unavailable",
                "Sorry, we couldn't log you in at this time. The account store is unavailable.",
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            authenticated: false,
            error: self.message,
            error_code: self.error_code.to_string(),
            debug: self.debug,
        });
        (self.status, body).into_response()
    }
}
