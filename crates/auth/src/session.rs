//! HS256 session tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use easypaies_core::UserId;

use crate::claims::{SessionClaims, TokenValidationError, validate_claims};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("token encoding failed: {0}")]
    Encode(jsonwebtoken::errors::Error),

    #[error("token is malformed or has a bad signature: {0}")]
    Decode(jsonwebtoken::errors::Error),

    #[error(transparent)]
    Window(#[from] TokenValidationError),
}

/// A freshly signed token and the claims inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    pub token: String,
    pub claims: SessionClaims,
}

/// Signs and verifies session tokens with a process-wide secret.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl core::fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionIssuer").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl SessionIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: UserId, now: DateTime<Utc>) -> Result<IssuedSession, SessionError> {
        let claims = SessionClaims {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(SessionError::Encode)?;
        Ok(IssuedSession { token, claims })
    }

    /// Check the signature, then the time window against `now`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the caller's clock, without leeway.
        validation.validate_exp = false;

        let data = decode::<SessionClaims>(token, &self.decoding, &validation).map_err(SessionError::Decode)?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}
