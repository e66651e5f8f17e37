//! `easypaies-core`: domain building blocks shared by every Easy-Paies crate.
//!
//! Pure domain primitives only: identifiers, the domain error model, the
//! aggregate contract and a few validated value types. No IO lives here.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod matricule;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AbsenceRequestId, AggregateId, EmployeeId, EntityId, ManagementId, UserId};
pub use matricule::{Matricule, PayCode};
