//! User account record and its credential lifecycle.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;

use easypaies_core::{DomainError, EmployeeId, EntityId, ManagementId, UserId};

use crate::credentials::{self, CredentialError, PasswordHasher};
use crate::principal::Principal;
use crate::roles::Role;

/// How long a mailed secret stays redeemable.
pub const SECRET_TTL_MINUTES: i64 = 10;

/// Fields supplied when an account is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub manager_of: Option<ManagementId>,
    pub customer_of: Option<EntityId>,
}

/// A login identity.
///
/// Credential material (hash, token digests, change timestamp) is never
/// serialized; the struct can be returned as-is from handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub manager_of: Option<ManagementId>,
    pub customer_of: Option<EntityId>,
    pub employee_id: Option<EmployeeId>,
    pub first_connection: bool,
    pub active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,

    #[serde(skip)]
    password_hash: String,
    #[serde(skip)]
    password_changed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    password_reset_token: Option<String>,
    #[serde(skip)]
    password_reset_expires: Option<DateTime<Utc>>,
    #[serde(skip)]
    email_verification_token: Option<String>,
    #[serde(skip)]
    email_verification_expires: Option<DateTime<Utc>>,
}

impl UserAccount {
    /// Create a fresh account. New records never carry a password-change
    /// timestamp, so tokens issued right after signup are valid.
    pub fn create(
        new: NewAccount,
        password: &str,
        hasher: &PasswordHasher,
        now: DateTime<Utc>,
    ) -> Result<Self, CredentialError> {
        let password_hash = hasher.hash(password)?;
        Ok(Self {
            id: UserId::new(),
            first_name: new.first_name,
            last_name: new.last_name,
            email: normalize_email(&new.email),
            role: new.role,
            manager_of: new.manager_of,
            customer_of: new.customer_of,
            employee_id: None,
            first_connection: true,
            active: true,
            email_verified: false,
            created_at: now,
            password_hash,
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            email_verification_token: None,
            email_verification_expires: None,
        })
    }

    pub fn verify_password(&self, candidate: &str, hasher: &PasswordHasher) -> bool {
        hasher.verify(candidate, &self.password_hash)
    }

    /// Replace the password. Returns `false` (and touches nothing) when the
    /// plaintext is the current password.
    pub fn set_password(
        &mut self,
        plaintext: &str,
        hasher: &PasswordHasher,
        now: DateTime<Utc>,
    ) -> Result<bool, CredentialError> {
        if self.verify_password(plaintext, hasher) {
            return Ok(false);
        }
        self.password_hash = hasher.hash(plaintext)?;
        self.mark_password_changed(now);
        Ok(true)
    }

    /// Backdated by one second: a token minted in the same request as the
    /// change must still pass the staleness check.
    pub fn mark_password_changed(&mut self, now: DateTime<Utc>) {
        self.password_changed_at = Some(now - Duration::seconds(1));
    }

    pub fn password_changed_at(&self) -> Option<DateTime<Utc>> {
        self.password_changed_at
    }

    /// True when the password changed strictly after a token issued at
    /// `issued_at` (Unix seconds).
    pub fn changed_password_after(&self, issued_at: i64) -> bool {
        self.password_changed_at
            .is_some_and(|changed| issued_at < changed.timestamp())
    }

    /// Reissue an interim password.
    ///
    /// The returned plaintext becomes the actual password; only its digest is
    /// kept as the reset token. Callers stage this on a copy and persist it
    /// once the secret has been mailed.
    pub fn issue_reset_secret<R: Rng>(
        &mut self,
        rng: &mut R,
        hasher: &PasswordHasher,
        now: DateTime<Utc>,
    ) -> Result<String, CredentialError> {
        let secret = credentials::generate_interim_password(rng);
        self.password_hash = hasher.hash(&secret)?;
        self.mark_password_changed(now);
        self.password_reset_token = Some(credentials::sha256_hex(&secret));
        self.password_reset_expires = Some(now + Duration::minutes(SECRET_TTL_MINUTES));
        Ok(secret)
    }

    /// Copy the password and reset-token fields of a staged copy onto this
    /// record, leaving every other field as it is.
    pub fn adopt_reset_from(&mut self, staged: &UserAccount) {
        self.password_hash = staged.password_hash.clone();
        self.password_changed_at = staged.password_changed_at;
        self.password_reset_token = staged.password_reset_token.clone();
        self.password_reset_expires = staged.password_reset_expires;
    }

    pub fn reset_token_digest(&self) -> Option<&str> {
        self.password_reset_token.as_deref()
    }

    /// Drop the reset token once the interim password has been used.
    pub fn clear_reset_token(&mut self) {
        self.password_reset_token = None;
        self.password_reset_expires = None;
    }

    pub fn issue_email_verification_secret<R: Rng>(&mut self, rng: &mut R, now: DateTime<Utc>) -> String {
        let secret = credentials::generate_email_secret(rng);
        self.email_verification_token = Some(credentials::sha256_hex(&secret));
        self.email_verification_expires = Some(now + Duration::minutes(SECRET_TTL_MINUTES));
        secret
    }

    /// Copy only the pending verification code of a staged copy.
    pub fn adopt_email_verification_from(&mut self, staged: &UserAccount) {
        self.email_verification_token = staged.email_verification_token.clone();
        self.email_verification_expires = staged.email_verification_expires;
    }

    pub fn email_verification_pending(&self) -> bool {
        self.email_verification_token.is_some()
    }

    pub fn confirm_email(&mut self, candidate: &str, now: DateTime<Utc>) -> Result<(), DomainError> {
        let (Some(digest), Some(expires)) = (&self.email_verification_token, self.email_verification_expires) else {
            return Err(DomainError::invariant("no e-mail verification pending"));
        };
        if now >= expires {
            return Err(DomainError::validation("verification code has expired"));
        }
        if credentials::sha256_hex(candidate.trim()) != *digest {
            return Err(DomainError::validation("verification code is invalid"));
        }
        self.email_verified = true;
        self.email_verification_token = None;
        self.email_verification_expires = None;
        Ok(())
    }

    /// Role plus the link that role is meaningful with.
    pub fn principal(&self) -> Principal {
        Principal::from_account(self)
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MIN_BCRYPT_COST;

    fn hasher() -> PasswordHasher {
        PasswordHasher::with_cost(MIN_BCRYPT_COST)
    }

    fn account(now: DateTime<Utc>) -> UserAccount {
        UserAccount::create(
            NewAccount {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: " Ada@Example.COM ".into(),
                role: Role::Employer,
                manager_of: None,
                customer_of: Some(EntityId::new()),
            },
            "first-password",
            &hasher(),
            now,
        )
        .unwrap()
    }

    #[test]
    fn create_normalizes_email_and_has_no_change_stamp() {
        let acc = account(Utc::now());
        assert_eq!(acc.email, "ada@example.com");
        assert!(acc.password_changed_at().is_none());
        assert!(acc.first_connection);
        assert!(acc.verify_password("first-password", &hasher()));
    }

    #[test]
    fn serialization_hides_credentials() {
        let json = serde_json::to_value(account(Utc::now())).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "employer");
        assert_eq!(json["firstName"], "Ada");
    }

    #[test]
    fn set_same_password_is_a_no_op() {
        let now = Utc::now();
        let mut acc = account(now);
        assert!(!acc.set_password("first-password", &hasher(), now).unwrap());
        assert!(acc.password_changed_at().is_none());
    }

    #[test]
    fn set_password_backdates_change_by_one_second() {
        let now = Utc::now();
        let mut acc = account(now);
        assert!(acc.set_password("second-password", &hasher(), now).unwrap());
        assert_eq!(acc.password_changed_at(), Some(now - Duration::seconds(1)));
        assert!(acc.verify_password("second-password", &hasher()));
        assert!(!acc.verify_password("first-password", &hasher()));
    }

    #[test]
    fn tokens_issued_before_change_are_stale() {
        let t0 = Utc::now();
        let mut acc = account(t0);
        acc.set_password("second-password", &hasher(), t0 + Duration::seconds(1))
            .unwrap();

        assert!(acc.changed_password_after((t0 - Duration::seconds(3)).timestamp()));
        // Minted in the same request as the change.
        assert!(!acc.changed_password_after((t0 + Duration::seconds(1)).timestamp()));
    }

    #[test]
    fn reset_secret_becomes_the_password() {
        let now = Utc::now();
        let mut acc = account(now);
        let secret = acc
            .issue_reset_secret(&mut rand::thread_rng(), &hasher(), now)
            .unwrap();

        assert_eq!(secret.len(), 12);
        assert!(acc.verify_password(&secret, &hasher()));
        assert_eq!(acc.reset_token_digest(), Some(credentials::sha256_hex(&secret).as_str()));
        assert!(acc.password_changed_at().is_some());
    }

    #[test]
    fn adopting_a_staged_reset_keeps_other_fields() {
        let now = Utc::now();
        let mut live = account(now);
        let mut staged = live.clone();
        let secret = staged
            .issue_reset_secret(&mut rand::thread_rng(), &hasher(), now)
            .unwrap();

        live.active = false;
        live.role = Role::Admin;
        live.adopt_reset_from(&staged);

        assert!(live.verify_password(&secret, &hasher()));
        assert_eq!(live.reset_token_digest(), staged.reset_token_digest());
        assert!(!live.active);
        assert_eq!(live.role, Role::Admin);
    }

    #[test]
    fn email_verification_round_trip_and_expiry() {
        let now = Utc::now();
        let mut acc = account(now);
        let secret = acc.issue_email_verification_secret(&mut rand::thread_rng(), now);

        assert!(acc.confirm_email("00000000", now).is_err() || secret == "00000000");
        assert!(acc
            .confirm_email(&secret, now + Duration::minutes(SECRET_TTL_MINUTES))
            .is_err());
        acc.confirm_email(&secret, now + Duration::minutes(1)).unwrap();
        assert!(acc.email_verified);
        assert!(acc.confirm_email(&secret, now).is_err(), "code is single use");
    }
}
