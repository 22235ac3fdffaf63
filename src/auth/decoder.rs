// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT verification and claim-set enforcement.
//!
//! Signature, `exp` and `nbf` checks are delegated to `jsonwebtoken`; this
//! module builds the verification key from [`Settings`], classifies every
//! library failure into an [`AuthError`], and enforces the required claims.

use std::collections::HashSet;
use std::sync::Arc;

use base64ct::{Base64, Encoding};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde_json::{Map, Value};

use super::claims::{claim, IdentityClaims, ResolvedIdentity, EXTENSION_REQUIRED_CLAIMS};
use super::settings::{Settings, SigningAlgorithm};
use super::AuthError;

/// Length of a raw Ed25519 public key.
const ED25519_PUBLIC_KEY_LEN: usize = 32;

/// Verifies tokens against the configured algorithm and key.
#[derive(Debug, Clone)]
pub struct TokenDecoder {
    settings: Arc<Settings>,
}

impl TokenDecoder {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Verify `token` and return its claims.
    pub fn decode(&self, token: &str) -> Result<IdentityClaims, AuthError> {
        let key = self.decoding_key()?;
        let validation = self.validation();

        tracing::debug!(algorithm = %self.settings.algorithm(), "Decoding JWT");
        let token_data = decode::<Map<String, Value>>(token, &key, &validation).map_err(|e| {
            let classified = classify(e.kind());
            tracing::warn!(
                error = %e,
                error_code = classified.error_code(),
                "JWT decode failed"
            );
            classified
        })?;

        let claims = IdentityClaims::new(token_data.claims);
        self.check_issued_at(&claims)?;
        self.check_required_claims(&claims)?;
        Ok(claims)
    }

    /// Verify `token` and map its claims into a [`ResolvedIdentity`].
    pub fn process(&self, token: &str) -> Result<ResolvedIdentity, AuthError> {
        let claims = self.decode(token)?;
        let identity = ResolvedIdentity::from_claims(&claims, &self.settings);
        tracing::debug!(
            subject = identity.subject(),
            issuer = identity.issuer(),
            groups = ?identity.groups(),
            "Mapped JWT claims to identity"
        );
        Ok(identity)
    }

    fn decoding_key(&self) -> Result<DecodingKey, AuthError> {
        let key = self.settings.key();
        let result = match self.settings.algorithm() {
            SigningAlgorithm::HS256 => Ok(DecodingKey::from_secret(key.as_bytes())),
            SigningAlgorithm::RS256 => {
                DecodingKey::from_rsa_pem(key.as_bytes()).map_err(|e| e.to_string())
            }
            SigningAlgorithm::EdDSA => ed25519_key(key),
        };

        result.map_err(|reason| {
            tracing::error!(
                algorithm = %self.settings.algorithm(),
                reason = %reason,
                "Configured JWT key is not usable"
            );
            AuthError::InvalidKeyMaterial
        })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.settings.algorithm().jwt_algorithm());
        validation.leeway = self.settings.leeway_seconds();
        validation.validate_nbf = true;
        // Audience and issuer are identity data here, not constraints.
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();
        validation
    }

    fn check_issued_at(&self, claims: &IdentityClaims) -> Result<(), AuthError> {
        let Some(issued_at) = claims.timestamp(claim::ISSUED_AT) else {
            return Ok(());
        };
        let now = chrono::Utc::now().timestamp();
        let leeway = i64::try_from(self.settings.leeway_seconds()).unwrap_or(i64::MAX);
        if issued_at > now.saturating_add(leeway) {
            tracing::warn!(issued_at, now, "JWT issued in the future");
            return Err(AuthError::NotYetValid);
        }
        Ok(())
    }

    fn check_required_claims(&self, claims: &IdentityClaims) -> Result<(), AuthError> {
        let missing = claims.missing(EXTENSION_REQUIRED_CLAIMS);
        if !missing.is_empty() {
            tracing::warn!(?missing, "JWT is missing always-required claims");
            return Err(AuthError::MalformedOrIncompleteClaims);
        }

        let missing = claims.missing(self.settings.required_claims().iter().map(String::as_str));
        if !missing.is_empty() {
            tracing::warn!(?missing, "JWT is missing site-required claims");
            return Err(AuthError::MalformedOrIncompleteClaims);
        }
        Ok(())
    }
}

/// PEM public key, or standard base64 of the raw 32-byte public key.
fn ed25519_key(key: &str) -> Result<DecodingKey, String> {
    let key = key.trim();
    if key.starts_with("-----BEGIN") {
        return DecodingKey::from_ed_pem(key.as_bytes()).map_err(|e| e.to_string());
    }

    let raw = Base64::decode_vec(key).map_err(|e| format!("invalid base64: {e}"))?;
    if raw.len() != ED25519_PUBLIC_KEY_LEN {
        return Err(format!(
            "expected {ED25519_PUBLIC_KEY_LEN} key bytes, got {}",
            raw.len()
        ));
    }
    Ok(DecodingKey::from_ed_der(&raw))
}

/// Map a `jsonwebtoken` failure onto the authentication taxonomy.
fn classify(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::InvalidSignature => AuthError::SignatureInvalid,
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::ImmatureSignature => AuthError::NotYetValid,
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::MissingAlgorithm => AuthError::Malformed,
        ErrorKind::InvalidEcdsaKey
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::RsaFailedSigning
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::InvalidKeyFormat => AuthError::UnsupportedAlgorithmOrInvalidKey,
        _ => AuthError::UnknownDecodeError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "test-signing-secret";

    fn settings_with(required: &[&str]) -> Arc<Settings> {
        Arc::new(
            Settings::new(
                "HS256",
                SECRET,
                required.iter().map(|c| c.to_string()).collect(),
                None,
                None,
            )
            .unwrap()
            .with_leeway(0),
        )
    }

    fn decoder() -> TokenDecoder {
        TokenDecoder::new(settings_with(&[]))
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn base_claims() -> Value {
        json!({
            "preferred_username": "alice",
            "iss": "idp1",
            "aud": "wiki",
            "sub": "u123",
            "email": "alice@example.com",
            "iat": now() - 10,
            "exp": now() + 3600
        })
    }

    fn mint(claims: &Value) -> String {
        mint_with(Algorithm::HS256, claims, SECRET)
    }

    fn mint_with(alg: Algorithm, claims: &Value, secret: &str) -> String {
        encode(
            &Header::new(alg),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_is_processed() {
        let identity = decoder().process(&mint(&base_claims())).unwrap();
        assert_eq!(identity.username().as_deref(), Some("Alice"));
        assert_eq!(identity.subject(), "u123");
        assert_eq!(identity.issuer(), "idp1");
        assert_eq!(identity.audience(), "wiki");
        assert_eq!(identity.email_address(), "alice@example.com");
    }

    #[test]
    fn optional_claims_default_to_empty() {
        let mut claims = base_claims();
        claims.as_object_mut().unwrap().remove("email");
        let identity = decoder().process(&mint(&claims)).unwrap();
        assert_eq!(identity.email_address(), "");
        assert_eq!(identity.first_name(), "");
        assert_eq!(identity.last_name(), "");
        assert_eq!(identity.external_user_id(), "");
        assert!(identity.groups().is_empty());
    }

    #[test]
    fn each_missing_required_claim_is_rejected() {
        for name in EXTENSION_REQUIRED_CLAIMS {
            let mut claims = base_claims();
            claims.as_object_mut().unwrap().remove(name);
            assert_eq!(
                decoder().decode(&mint(&claims)).unwrap_err(),
                AuthError::MalformedOrIncompleteClaims,
                "missing {name}"
            );

            let mut claims = base_claims();
            claims[name] = json!("");
            assert_eq!(
                decoder().decode(&mint(&claims)).unwrap_err(),
                AuthError::MalformedOrIncompleteClaims,
                "empty {name}"
            );
        }
    }

    #[test]
    fn site_required_claims_are_enforced() {
        let decoder = TokenDecoder::new(settings_with(&["department"]));
        assert_eq!(
            decoder.decode(&mint(&base_claims())).unwrap_err(),
            AuthError::MalformedOrIncompleteClaims
        );

        let mut claims = base_claims();
        claims["department"] = json!("research");
        assert!(decoder.decode(&mint(&claims)).is_ok());
    }

    #[test]
    fn wrong_secret_is_signature_invalid() {
        let token = mint_with(Algorithm::HS256, &base_claims(), "another-secret");
        assert_eq!(
            decoder().decode(&token).unwrap_err(),
            AuthError::SignatureInvalid
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut claims = base_claims();
        claims["exp"] = json!(now() - 3600);
        assert_eq!(
            decoder().decode(&mint(&claims)).unwrap_err(),
            AuthError::Expired
        );
    }

    #[test]
    fn future_nbf_and_iat_are_not_yet_valid() {
        let mut claims = base_claims();
        claims["nbf"] = json!(now() + 3600);
        assert_eq!(
            decoder().decode(&mint(&claims)).unwrap_err(),
            AuthError::NotYetValid
        );

        let mut claims = base_claims();
        claims["iat"] = json!(now() + 3600);
        assert_eq!(
            decoder().decode(&mint(&claims)).unwrap_err(),
            AuthError::NotYetValid
        );
    }

    #[test]
    fn token_without_exp_is_accepted() {
        let mut claims = base_claims();
        claims.as_object_mut().unwrap().remove("exp");
        assert!(decoder().decode(&mint(&claims)).is_ok());
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(
            decoder().decode("not-a-jwt").unwrap_err(),
            AuthError::Malformed
        );
    }

    #[test]
    fn algorithm_mismatch_is_malformed() {
        let token = mint_with(Algorithm::HS384, &base_claims(), SECRET);
        assert_eq!(decoder().decode(&token).unwrap_err(), AuthError::Malformed);
    }

    #[test]
    fn unusable_keys_are_invalid_key_material() {
        let token = mint(&base_claims());

        let rsa = Settings::new("RS256", "not a pem", vec![], None, None).unwrap();
        assert_eq!(
            TokenDecoder::new(Arc::new(rsa)).decode(&token).unwrap_err(),
            AuthError::InvalidKeyMaterial
        );

        let ed_bad_base64 = Settings::new("EdDSA", "%%%", vec![], None, None).unwrap();
        assert_eq!(
            TokenDecoder::new(Arc::new(ed_bad_base64))
                .decode(&token)
                .unwrap_err(),
            AuthError::InvalidKeyMaterial
        );

        let ed_short = Settings::new("EdDSA", "AAAA", vec![], None, None).unwrap();
        assert_eq!(
            TokenDecoder::new(Arc::new(ed_short))
                .decode(&token)
                .unwrap_err(),
            AuthError::InvalidKeyMaterial
        );
    }

    #[test]
    fn raw_ed25519_key_is_accepted() {
        let key = Base64::encode_string(&[7u8; ED25519_PUBLIC_KEY_LEN]);
        assert!(ed25519_key(&key).is_ok());
    }

    const RS256_PRIVATE: &str = include_str!("testdata/rs256_private.pem");
    const RS256_PUBLIC: &str = include_str!("testdata/rs256_public.pem");
    const ED25519_PRIVATE: &str = include_str!("testdata/ed25519_private.pem");
    const ED25519_PUBLIC: &str = include_str!("testdata/ed25519_public.pem");
    /// Raw 32-byte public key of `ed25519_public.pem`, standard base64.
    const ED25519_PUBLIC_RAW: &str = "ck7Wqs6L/NZw5JUHqtvW0MOaVX/hIcsPl4B6vgth1Hk=";

    fn decoder_for(algorithm: &str, key: &str) -> TokenDecoder {
        TokenDecoder::new(Arc::new(
            Settings::new(algorithm, key, vec![], None, None).unwrap(),
        ))
    }

    #[test]
    fn rs256_token_round_trips() {
        let token = encode(
            &Header::new(Algorithm::RS256),
            &base_claims(),
            &EncodingKey::from_rsa_pem(RS256_PRIVATE.as_bytes()).unwrap(),
        )
        .unwrap();

        let identity = decoder_for("RS256", RS256_PUBLIC).process(&token).unwrap();
        assert_eq!(identity.subject(), "u123");
        assert_eq!(identity.username().as_deref(), Some("Alice"));

        // Same token against an HS256 deployment.
        assert_eq!(decoder().decode(&token).unwrap_err(), AuthError::Malformed);
    }

    #[test]
    fn eddsa_token_round_trips_with_pem_and_raw_keys() {
        let token = encode(
            &Header::new(Algorithm::EdDSA),
            &base_claims(),
            &EncodingKey::from_ed_pem(ED25519_PRIVATE.as_bytes()).unwrap(),
        )
        .unwrap();

        for key in [ED25519_PUBLIC, ED25519_PUBLIC_RAW] {
            let identity = decoder_for("EdDSA", key).process(&token).unwrap();
            assert_eq!(identity.issuer(), "idp1");
        }
    }

    #[test]
    fn eddsa_token_with_other_key_is_signature_invalid() {
        let token = encode(
            &Header::new(Algorithm::EdDSA),
            &base_claims(),
            &EncodingKey::from_ed_pem(ED25519_PRIVATE.as_bytes()).unwrap(),
        )
        .unwrap();

        let other = "mUZzrtsCT1B7hF+g4XaPo7pAv9zcO1Zt1zBFKvQq2a0=";
        let err = decoder_for("EdDSA", other).decode(&token).unwrap_err();
        assert_eq!(err, AuthError::SignatureInvalid);
    }

    #[test]
    fn classify_covers_library_kinds() {
        assert_eq!(classify(&ErrorKind::InvalidSignature), AuthError::SignatureInvalid);
        assert_eq!(classify(&ErrorKind::ExpiredSignature), AuthError::Expired);
        assert_eq!(classify(&ErrorKind::ImmatureSignature), AuthError::NotYetValid);
        assert_eq!(classify(&ErrorKind::InvalidToken), AuthError::Malformed);
        assert_eq!(
            classify(&ErrorKind::InvalidKeyFormat),
            AuthError::UnsupportedAlgorithmOrInvalidKey
        );
        assert_eq!(
            classify(&ErrorKind::InvalidIssuer),
            AuthError::UnknownDecodeError
        );
    }
}
