//! External token verification — validates Descope-issued JWTs.
//!
//! # Verification flow
//!
//! 1. Decode the JWT header (no verification) to extract `kid` and `alg`.
//! 2. Obtain the signing-key set via the [`KeyCache`].
//! 3. Verify the JWT signature and `exp` claim (60-second clock leeway).
//! 4. Require `sub` and a well-formed `email` claim; `name` stays optional.
//!
//! An unknown `kid` triggers a single forced cache refresh before failing,
//! so a provider key rotation is picked up without waiting out the TTL.

use jsonwebtoken::{
    Algorithm, DecodingKey, Header, TokenData, Validation,
    jwk::{AlgorithmParameters, JwkSet},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::jwks::{KeyCache, KeyFetchError};

/// Error variants for external token verification failures.
///
/// Every structural, cryptographic, or claim failure maps to a variant —
/// a failed verification is never treated as an anonymous identity.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Structurally valid and correctly signed, but past its `exp` claim.
    #[error("external token expired")]
    Expired,

    /// Malformed structure, bad signature, or missing/ill-formed claims.
    #[error("external token invalid")]
    Invalid,

    /// The JWT header contains no `kid` field.
    #[error("external token missing 'kid' header field")]
    MissingKeyId,

    /// The `kid` is not in the provider's key set, even after a refresh.
    #[error("unknown key id: {0}")]
    UnknownKeyId(String),

    /// The signing-key set could not be obtained.
    #[error(transparent)]
    KeyFetch(#[from] KeyFetchError),
}

/// Verified identity extracted from a valid external token.
///
/// Produced only by [`DescopeVerifier::verify`]; never constructed from
/// unvalidated input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalIdentity {
    /// Descope `sub` claim (opaque user id, stable per real-world user).
    pub subject: String,
    /// Email address from the token claims.
    pub email: String,
    /// Display name (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Token expiry (Unix timestamp).
    pub expires_at: u64,
}

/// Claims extracted from a Descope session JWT.
#[derive(Debug, Deserialize)]
struct DescopeClaims {
    sub: String,
    /// Expiry (Unix timestamp) — validated by jsonwebtoken internally
    exp: u64,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// External token verifier — holds the signing-key cache.
pub struct DescopeVerifier {
    keys: KeyCache,
}

impl DescopeVerifier {
    /// Create a verifier over the given key cache.
    #[must_use]
    pub fn new(keys: KeyCache) -> Self {
        Self { keys }
    }

    /// Verify an external token and return the extracted identity.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError`] if the token is invalid, expired, signed with
    /// an unknown key, or the signing keys cannot be fetched. No network
    /// call occurs beyond what the key cache performs.
    pub async fn verify(&self, token: &str) -> Result<ExternalIdentity, VerifyError> {
        let header = jsonwebtoken::decode_header(token).map_err(map_jwt_error)?;
        let kid = header.kid.clone().ok_or(VerifyError::MissingKeyId)?;

        let decoding_key = self.find_decoding_key(&kid).await?;

        let validation = build_validation(&header);
        let token_data: TokenData<DescopeClaims> =
            jsonwebtoken::decode(token, &decoding_key, &validation).map_err(map_jwt_error)?;
        let claims = token_data.claims;

        if claims.sub.is_empty() {
            warn!("External token carries an empty subject claim");
            return Err(VerifyError::Invalid);
        }

        let email = match claims.email {
            Some(ref e) if e.contains('@') => e.clone(),
            _ => {
                warn!(subject = %claims.sub, "External token missing a well-formed email claim");
                return Err(VerifyError::Invalid);
            }
        };

        Ok(ExternalIdentity {
            subject: claims.sub,
            email,
            name: claims.name,
            expires_at: claims.exp,
        })
    }

    /// Find a decoding key by `kid`, refreshing the key cache once if absent.
    async fn find_decoding_key(&self, kid: &str) -> Result<DecodingKey, VerifyError> {
        let jwks = self.keys.get().await?;
        if let Some(key) = find_key_in_jwks(&jwks, kid) {
            return Ok(key);
        }

        // Unknown kid: refresh once and retry
        debug!(kid = %kid, "Key not found in cached JWKS, refreshing");
        let jwks = self.keys.refresh(true).await?;
        find_key_in_jwks(&jwks, kid).ok_or_else(|| VerifyError::UnknownKeyId(kid.to_string()))
    }
}

/// Collapse jsonwebtoken errors into the gateway's taxonomy: expiry stays
/// distinguishable, everything else is `Invalid`.
fn map_jwt_error(e: jsonwebtoken::errors::Error) -> VerifyError {
    match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => VerifyError::Expired,
        _ => VerifyError::Invalid,
    }
}

/// Find a JWK by `kid` in a `JwkSet` and convert it to a `DecodingKey`.
fn find_key_in_jwks(jwks: &JwkSet, kid: &str) -> Option<DecodingKey> {
    for jwk in &jwks.keys {
        let jwk_kid = jwk.common.key_id.as_deref().unwrap_or("");
        if jwk_kid != kid {
            continue;
        }

        return match &jwk.algorithm {
            AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e).ok(),
            AlgorithmParameters::EllipticCurve(ec) => {
                DecodingKey::from_ec_components(&ec.x, &ec.y).ok()
            }
            AlgorithmParameters::OctetKey(_) | AlgorithmParameters::OctetKeyPair(_) => None,
        };
    }
    None
}

/// Build a [`Validation`] from the JWT header algorithm.
fn build_validation(header: &Header) -> Validation {
    let alg = match header.alg {
        Algorithm::RS256 => Algorithm::RS256,
        Algorithm::RS384 => Algorithm::RS384,
        Algorithm::RS512 => Algorithm::RS512,
        Algorithm::ES256 => Algorithm::ES256,
        Algorithm::ES384 => Algorithm::ES384,
        other => {
            warn!(alg = ?other, "Unsupported JWT algorithm, defaulting to RS256");
            Algorithm::RS256
        }
    };

    let mut v = Validation::new(alg);
    v.leeway = 60; // 60-second clock skew tolerance
    // Descope sets `aud` to the project id on some token types and omits it
    // on others; the signature plus `exp` carry the trust decision here.
    v.validate_aud = false;
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_jwt_error_isolates_expiry() {
        // GIVEN: an ExpiredSignature error
        let e = jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::ExpiredSignature,
        );

        // THEN: mapped to Expired, not Invalid
        assert!(matches!(map_jwt_error(e), VerifyError::Expired));
    }

    #[test]
    fn map_jwt_error_collapses_other_kinds() {
        let e = jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::InvalidSignature,
        );
        assert!(matches!(map_jwt_error(e), VerifyError::Invalid));

        let e = jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidToken);
        assert!(matches!(map_jwt_error(e), VerifyError::Invalid));
    }

    #[test]
    fn find_key_in_empty_jwks_returns_none() {
        let jwks = JwkSet { keys: Vec::new() };
        assert!(find_key_in_jwks(&jwks, "any-kid").is_none());
    }

    #[test]
    fn external_identity_serializes_without_absent_name() {
        // GIVEN: an identity with no display name
        let identity = ExternalIdentity {
            subject: "usr_123".to_string(),
            email: "a@b.com".to_string(),
            name: None,
            expires_at: 1_900_000_000,
        };

        // WHEN: serialized to JSON
        let json = serde_json::to_string(&identity).unwrap();

        // THEN: the name field is omitted entirely
        assert!(json.contains("a@b.com"));
        assert!(!json.contains("name"));
    }
}
