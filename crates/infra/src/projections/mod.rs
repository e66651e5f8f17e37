//! Projections: idempotent consumers of bus envelopes that maintain read
//! state.

pub mod usage_counters;

pub use usage_counters::UsageCountersProjection;
