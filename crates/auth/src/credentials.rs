//! Password hashing and one-off secret generation.
//!
//! Passwords are stored as bcrypt hashes. Secrets that are mailed to a user
//! (interim passwords, e-mail verification codes) are only ever persisted as
//! their SHA-256 hex digest so a database leak does not reveal them.

use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Production work factor.
pub const DEFAULT_BCRYPT_COST: u32 = 12;
/// Lowest cost bcrypt accepts.
pub const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

pub const INTERIM_PASSWORD_LEN: usize = 12;
pub const MIN_PASSWORD_LEN: usize = 8;

const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    TooShort,

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// bcrypt with a fixed cost.
///
/// The cost is a constructor argument only so test suites can run with the
/// bcrypt minimum; production wiring uses [`PasswordHasher::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            cost: DEFAULT_BCRYPT_COST,
        }
    }
}

impl PasswordHasher {
    pub fn with_cost(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_BCRYPT_COST, MAX_BCRYPT_COST),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        if plaintext.chars().count() < MIN_PASSWORD_LEN {
            return Err(CredentialError::TooShort);
        }
        Ok(bcrypt::hash(plaintext, self.cost)?)
    }

    /// Compare a candidate against a stored hash. A malformed hash never
    /// verifies.
    pub fn verify(&self, candidate: &str, hash: &str) -> bool {
        match bcrypt::verify(candidate, hash) {
            Ok(ok) => ok,
            Err(e) => {
                tracing::warn!(error = %e, "stored password hash is malformed");
                false
            }
        }
    }
}

/// 12 characters of upper/lower/digit, with at least one of each class.
pub fn generate_interim_password<R: Rng>(rng: &mut R) -> String {
    let all: Vec<u8> = [UPPER, LOWER, DIGITS].concat();

    let mut chars = vec![pick(rng, UPPER), pick(rng, LOWER), pick(rng, DIGITS)];
    while chars.len() < INTERIM_PASSWORD_LEN {
        chars.push(pick(rng, &all));
    }

    // Fisher-Yates so the guaranteed classes are not always up front.
    for i in (1..chars.len()).rev() {
        let j = rng.gen_range(0..=i);
        chars.swap(i, j);
    }

    chars.into_iter().map(char::from).collect()
}

/// 4 random bytes, hex encoded (8 characters).
pub fn generate_email_secret<R: Rng>(rng: &mut R) -> String {
    let bytes: [u8; 4] = rng.r#gen();
    hex::encode(bytes)
}

pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

fn pick<R: Rng>(rng: &mut R, set: &[u8]) -> u8 {
    set[rng.gen_range(0..set.len())]
}
