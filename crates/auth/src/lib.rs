//! `easypaies-auth`: credentials, sessions and the access guard.
//!
//! Decoupled from HTTP and storage: callers hand in header values, user
//! records and the current time, and get typed decisions back.

pub mod account;
pub mod claims;
pub mod credentials;
pub mod guard;
pub mod principal;
pub mod roles;
pub mod session;

pub use account::{NewAccount, UserAccount};
pub use claims::{SessionClaims, TokenValidationError, validate_claims};
pub use credentials::{CredentialError, PasswordHasher, sha256_hex};
pub use guard::{GuardError, check_session, extract_bearer, restrict_to};
pub use principal::Principal;
pub use roles::Role;
pub use session::{IssuedSession, SessionError, SessionIssuer};
