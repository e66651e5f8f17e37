//! Append-only event store boundary.
//!
//! Storage-agnostic contract for entity-scoped event streams, plus the
//! in-memory implementation the server runs on.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
