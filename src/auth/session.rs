//! First-party session credentials — HS256 issue and verify.
//!
//! Pure transform logic: no network, no database. The credential embeds the
//! external subject id, email, and an expiry instant; it travels exclusively
//! as an HTTP-only cookie set by the gateway.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Error variants for session credential failures.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Correctly signed but past its expiry instant.
    #[error("session credential expired")]
    Expired,

    /// Signature mismatch or structural corruption.
    #[error("session credential invalid")]
    Invalid,

    /// Signing failed while minting a credential.
    #[error("session signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

/// Claims carried by a first-party session credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// External subject identifier.
    pub sub: String,
    /// Email of the authenticated user.
    pub email: String,
    /// Expiry (Unix timestamp).
    pub exp: u64,
}

/// Issues and verifies first-party session credentials with a server-held
/// secret.
pub struct SessionSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionSigner {
    /// Create a signer over `secret` minting credentials valid for `ttl`.
    #[must_use]
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Lifetime of issued credentials.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a credential for a verified identity, expiring `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Signing`] if encoding fails.
    pub fn issue(&self, subject: &str, email: &str) -> Result<String, SessionError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();

        let claims = SessionClaims {
            sub: subject.to_string(),
            email: email.to_string(),
            exp: now + self.ttl.as_secs(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(SessionError::Signing)
    }

    /// Verify a credential string and return its claims.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Expired`] for a valid-but-expired credential
    /// and [`SessionError::Invalid`] for anything else.
    pub fn verify(&self, credential: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 60;

        jsonwebtoken::decode::<SessionClaims>(credential, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn signer() -> SessionSigner {
        SessionSigner::new("test-secret", Duration::from_secs(86_400))
    }

    #[test]
    fn issue_then_verify_round_trips_subject_and_email() {
        // GIVEN: a freshly issued credential
        let signer = signer();
        let credential = signer.issue("usr_123", "a@b.com").unwrap();

        // WHEN: verified
        let claims = signer.verify(&credential).unwrap();

        // THEN: subject and email survive unchanged
        assert_eq!(claims.sub, "usr_123");
        assert_eq!(claims.email, "a@b.com");
    }

    #[test]
    fn expired_credential_fails_with_expired_not_invalid() {
        // GIVEN: a credential whose exp is well past the 60 s leeway
        let signer = signer();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let stale = SessionClaims {
            sub: "usr_123".to_string(),
            email: "a@b.com".to_string(),
            exp: now - 120,
        };
        let credential = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &stale,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        // WHEN: verified
        let err = signer.verify(&credential).unwrap_err();

        // THEN: the expiry kind is preserved
        assert!(matches!(err, SessionError::Expired));
    }

    #[test]
    fn credential_signed_with_wrong_secret_is_invalid() {
        // GIVEN: a credential minted under a different secret
        let other = SessionSigner::new("some-other-secret", Duration::from_secs(86_400));
        let credential = other.issue("usr_123", "a@b.com").unwrap();

        // WHEN: verified against our secret
        let err = signer().verify(&credential).unwrap_err();

        // THEN: rejected as invalid, not expired
        assert!(matches!(err, SessionError::Invalid));
    }

    #[test]
    fn structurally_corrupt_credential_is_invalid() {
        let err = signer().verify("not-a-jwt").unwrap_err();
        assert!(matches!(err, SessionError::Invalid));
    }

    #[test]
    fn issued_expiry_matches_configured_ttl() {
        let signer = SessionSigner::new("test-secret", Duration::from_secs(3600));
        let credential = signer.issue("usr_123", "a@b.com").unwrap();
        let claims = signer.verify(&credential).unwrap();

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let remaining = claims.exp - now;
        assert!((3590..=3600).contains(&remaining), "remaining {remaining}");
    }
}
