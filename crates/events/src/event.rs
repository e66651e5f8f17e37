use chrono::{DateTime, Utc};

/// A fact that happened in the domain.
///
/// Events are immutable, versioned for schema evolution and only ever
/// appended.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable type name (e.g. "payroll.ledger.bonus_recorded").
    fn event_type(&self) -> &'static str;

    /// Schema version of this event type.
    fn version(&self) -> u32;

    /// Business time of the fact.
    fn occurred_at(&self) -> DateTime<Utc>;
}
