// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for the raw login credential.
//!
//! The credential is read from the `Authorization` header, or from an
//! `Authorization` field of a form-encoded POST body when no header is sent:
//!
//! ```rust,ignore
//! async fn login(RawCredential(raw): RawCredential) -> impl IntoResponse {
//!     // raw is Option<String>, still carrying its "Bearer" prefix
//! }
//! ```

use std::convert::Infallible;

use axum::{
    extract::{FromRequest, Request},
    http::header::{AUTHORIZATION, CONTENT_TYPE},
    Form,
};
use serde::Deserialize;

/// Form body accepted by the login endpoint.
#[derive(Debug, Deserialize)]
struct CredentialForm {
    #[serde(rename = "Authorization")]
    authorization: Option<String>,
}

/// Unvalidated credential as sent by the client, header first.
///
/// Never rejects: a missing credential is reported as `None` and handled by
/// the login pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCredential(pub Option<String>);

impl<S: Send + Sync> FromRequest<S> for RawCredential {
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(value) = req.headers().get(AUTHORIZATION) {
            match value.to_str() {
                Ok(header) if !header.is_empty() => {
                    return Ok(RawCredential(Some(header.to_string())));
                }
                Ok(_) => {}
                Err(_) => tracing::debug!("Ignoring non-ASCII Authorization header"),
            }
        }

        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        if !is_form {
            return Ok(RawCredential(None));
        }

        match Form::<CredentialForm>::from_request(req, state).await {
            Ok(Form(form)) => Ok(RawCredential(form.authorization)),
            Err(rejection) => {
                tracing::debug!(error = %rejection, "Unreadable login form");
                Ok(RawCredential(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Method;

    async fn extract(req: Request) -> Option<String> {
        let RawCredential(raw) = RawCredential::from_request(req, &()).await.unwrap();
        raw
    }

    fn form_request() -> axum::http::request::Builder {
        Request::builder()
            .method(Method::POST)
            .uri("/v1/login")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
    }

    #[tokio::test]
    async fn reads_authorization_header() {
        let req = Request::builder()
            .uri("/v1/login")
            .header(AUTHORIZATION, "Bearer abc")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract(req).await.as_deref(), Some("Bearer abc"));
    }

    #[tokio::test]
    async fn header_takes_precedence_over_form() {
        let body = "Authorization=Bearer+from-form";
        let req = form_request()
            .header(AUTHORIZATION, "Bearer from-header")
            .body(Body::from(body))
            .unwrap();
        assert_eq!(extract(req).await.as_deref(), Some("Bearer from-header"));
    }

    #[tokio::test]
    async fn falls_back_to_form_field() {
        let body = "Authorization=Bearer+from-form&other=1";
        let req = form_request().body(Body::from(body)).unwrap();
        assert_eq!(extract(req).await.as_deref(), Some("Bearer from-form"));
    }

    #[tokio::test]
    async fn missing_everywhere_is_none() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/v1/login")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract(req).await, None);

        let body = "other=1";
        let req = form_request().body(Body::from(body)).unwrap();
        assert_eq!(extract(req).await, None);
    }

    #[tokio::test]
    async fn json_body_is_ignored() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/v1/login")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"Authorization":"Bearer x"}"#))
            .unwrap();
        assert_eq!(extract(req).await, None);
    }
}
