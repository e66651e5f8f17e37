//! Event contracts, envelopes and the pub/sub bus.
//!
//! Domain crates implement [`Event`] on their event enums; infra wraps them in
//! an [`EventEnvelope`] once stored and fans them out over an [`EventBus`].

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod scoped;
pub mod usage;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use scoped::EntityScoped;
pub use usage::{UsageEvent, UsageFact, USAGE_AGGREGATE_TYPE};
