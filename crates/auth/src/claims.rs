use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use easypaies_core::UserId;

/// Claims carried by a session token.
///
/// Only the subject and timestamps. Role and company links are re-read from
/// the user record on every request. Timestamps are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Check the time window of already-decoded claims against `now`.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims_at(now: DateTime<Utc>, ttl_secs: i64) -> SessionClaims {
        SessionClaims {
            sub: UserId::new(),
            iat: now.timestamp(),
            exp: now.timestamp() + ttl_secs,
        }
    }

    #[test]
    fn valid_inside_window() {
        let now = Utc::now();
        assert!(validate_claims(&claims_at(now, 60), now + Duration::seconds(30)).is_ok());
    }

    #[test]
    fn expired_at_exp() {
        let now = Utc::now();
        assert_eq!(
            validate_claims(&claims_at(now, 60), now + Duration::seconds(60)),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn rejects_future_and_inverted_windows() {
        let now = Utc::now();
        assert_eq!(
            validate_claims(&claims_at(now, 60), now - Duration::seconds(5)),
            Err(TokenValidationError::NotYetValid)
        );
        assert_eq!(
            validate_claims(&claims_at(now, 0), now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
