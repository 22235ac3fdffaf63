// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

/// Prefix of every message shown to the person trying to log in.
const USER_MESSAGE_PREFIX: &str = "Sorry, we couldn't log you in at this time. \
     Please inform the site administrators of the following error:";

/// Authentication error type.
///
/// Every failure of the token pipeline is classified into one of these
/// variants; nothing else crosses the module boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No credential after normalization (authentication not attempted)
    MissingCredential,
    /// Configured key could not be turned into a verification key
    InvalidKeyMaterial,
    /// Algorithm unsupported by the key, or the crypto backend failed
    UnsupportedAlgorithmOrInvalidKey,
    /// Token signature is invalid
    SignatureInvalid,
    /// Token used before `nbf` or `iat`
    NotYetValid,
    /// Token used after `exp`
    Expired,
    /// Token is malformed or its algorithm does not match the key
    Malformed,
    /// Token decoded but a required claim is missing or empty
    MalformedOrIncompleteClaims,
    /// Any other decode failure
    UnknownDecodeError,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::InvalidKeyMaterial => "invalid_key_material",
            AuthError::UnsupportedAlgorithmOrInvalidKey => "unsupported_algorithm_or_invalid_key",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::NotYetValid => "token_not_yet_valid",
            AuthError::Expired => "token_expired",
            AuthError::Malformed => "malformed_token",
            AuthError::MalformedOrIncompleteClaims => "incomplete_claims",
            AuthError::UnknownDecodeError => "unknown_decode_error",
        }
    }

    /// Get the HTTP status code for this error.
    ///
    /// Key problems are server misconfiguration; everything else is the
    /// caller's token.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidKeyMaterial | AuthError::UnsupportedAlgorithmOrInvalidKey => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Message suitable for the person logging in.
    pub fn user_message(&self) -> String {
        format!("{USER_MESSAGE_PREFIX} {self}")
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredential => {
                write!(f, "No JWT was provided (expected 'Bearer <token>').")
            }
            AuthError::InvalidKeyMaterial => write!(
                f,
                "Error occurred while attempting to decode JWT. The JWT key was not valid."
            ),
            AuthError::UnsupportedAlgorithmOrInvalidKey => write!(
                f,
                "Error occurred while attempting to decode JWT. Either the provided algorithm \
                 is unsupported, the provided key is invalid, or the crypto backend failed."
            ),
            AuthError::SignatureInvalid => write!(
                f,
                "Error occurred while attempting to decode JWT. The JWT signature was not valid."
            ),
            AuthError::NotYetValid => write!(
                f,
                "Error occurred while attempting to decode JWT. This JWT is not yet valid."
            ),
            AuthError::Expired => write!(
                f,
                "Error occurred while attempting to decode JWT. This JWT is expired."
            ),
            AuthError::Malformed => write!(
                f,
                "Error occurred while attempting to decode JWT. The JWT provided is malformed."
            ),
            AuthError::MalformedOrIncompleteClaims => write!(
                f,
                "Invalid JWT after decoding. JWT may be missing required data."
            ),
            AuthError::UnknownDecodeError => {
                write!(f, "Error occurred while attempting to decode JWT.")
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::collections::HashSet;

    const ALL: [AuthError; 9] = [
        AuthError::MissingCredential,
        AuthError::InvalidKeyMaterial,
        AuthError::UnsupportedAlgorithmOrInvalidKey,
        AuthError::SignatureInvalid,
        AuthError::NotYetValid,
        AuthError::Expired,
        AuthError::Malformed,
        AuthError::MalformedOrIncompleteClaims,
        AuthError::UnknownDecodeError,
    ];

    #[test]
    fn every_variant_has_distinct_message_and_code() {
        let messages: HashSet<String> = ALL.iter().map(|e| e.to_string()).collect();
        let codes: HashSet<&str> = ALL.iter().map(|e| e.error_code()).collect();
        assert_eq!(messages.len(), ALL.len());
        assert_eq!(codes.len(), ALL.len());
    }

    #[tokio::test]
    async fn expired_returns_401_with_generic_prefix() {
        let response = AuthError::Expired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["authenticated"], false);
        assert_eq!(body["error_code"], "token_expired");
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Sorry, we couldn't log you in"));
    }

    #[test]
    fn key_problems_are_server_errors() {
        assert_eq!(
            AuthError::InvalidKeyMaterial.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AuthError::MalformedOrIncompleteClaims.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }
}
