//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store (entity-scoped)
//!   ↓
//! 2. Rehydrate aggregate (apply historical events to rebuild state)
//!   ↓
//! 3. Handle command (pure decision logic, produces events)
//!   ↓
//! 4. Persist events to store (append-only)
//!   ↓
//! 5. Publish events to bus (projections, notifications)
//! ```
//!
//! Two append modes exist:
//!
//! - [`CommandDispatcher::dispatch`] appends with `ExpectedVersion::Exact`.
//!   Used for state transitions whose outcome depends on what the stream
//!   contains (deciding a request, closing a batch). On a version conflict
//!   the pipeline reloads and decides again, a bounded number of times.
//! - [`CommandDispatcher::dispatch_append`] appends with
//!   `ExpectedVersion::Any`. Used for commutative appends (recording a bonus
//!   or an absence): the store assigns the next sequence number under its
//!   lock, so concurrent appends never conflict and none is lost.
//!
//! This module contains no IO itself; it composes infrastructure traits.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use easypaies_core::{Aggregate, AggregateId, AggregateRoot, DomainError, EntityId, ExpectedVersion};
use easypaies_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// How many times `dispatch` re-runs a command after losing a version race.
pub const MAX_CONFLICT_RETRIES: usize = 5;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure that survived every retry.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// Loaded stream mixes entities or aggregates.
    #[error("entity isolation violation: {0}")]
    EntityIsolation(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// The aggregate refused the transition (e.g. deciding a request twice).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("suspended: {0}")]
    Suspended(String),

    #[error("unauthorized")]
    Unauthorized,

    /// Historical payloads no longer deserialize into the aggregate event type.
    #[error("event deserialization failed: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Store(EventStoreError),

    /// Publication failed after a successful append (at-least-once; retry may duplicate).
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            EventStoreError::EntityIsolation(msg) => DispatchError::EntityIsolation(msg.clone()),
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound(what) => DispatchError::NotFound(what),
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
            DomainError::Suspended(msg) => DispatchError::Suspended(msg),
        }
    }
}

/// Identifies the stream a command targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRef {
    pub entity_id: EntityId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: &'static str,
}

/// Reusable command execution engine.
///
/// Events are persisted before publication: if the append fails nothing is
/// published. If publication fails after a successful append the error is
/// returned but the events stay stored.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Rehydrate an aggregate for reading. Returns it together with its
    /// stream version.
    pub fn load<A>(&self, stream: &StreamRef, make_aggregate: impl FnOnce() -> A) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(stream.entity_id, stream.aggregate_id)?;
        validate_loaded_stream(stream.entity_id, stream.aggregate_id, &history)?;

        let mut aggregate = make_aggregate();
        apply_history(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// State transition: decide against the current stream and append with an
    /// exact version check, retrying on conflict.
    pub fn dispatch<A>(
        &self,
        stream: &StreamRef,
        command: A::Command,
        make_aggregate: impl Fn() -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: easypaies_events::Event + Serialize + DeserializeOwned,
    {
        let mut attempt = 0;
        loop {
            let aggregate = self.load(stream, &make_aggregate)?;
            let expected = ExpectedVersion::Exact(aggregate.version());

            match self.decide_and_append(stream, &aggregate, &command, expected) {
                Err(DispatchError::Concurrency(msg)) if attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    tracing::debug!(
                        entity_id = %stream.entity_id,
                        aggregate_type = stream.aggregate_type,
                        attempt,
                        reason = %msg,
                        "version conflict, retrying command"
                    );
                }
                other => return other,
            }
        }
    }

    /// Commutative append: the decision does not depend on stream contents
    /// beyond validation, so the store appends at whatever position is next.
    pub fn dispatch_append<A>(
        &self,
        stream: &StreamRef,
        command: A::Command,
        make_aggregate: impl FnOnce() -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: easypaies_events::Event + Serialize + DeserializeOwned,
    {
        let aggregate = self.load(stream, make_aggregate)?;
        self.decide_and_append(stream, &aggregate, &command, ExpectedVersion::Any)
    }

    fn decide_and_append<A>(
        &self,
        stream: &StreamRef,
        aggregate: &A,
        command: &A::Command,
        expected: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: easypaies_events::Event + Serialize,
    {
        // Decide events (no mutation)
        let decided = aggregate.handle(command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // Persist (append-only)
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    stream.entity_id,
                    stream.aggregate_id,
                    stream.aggregate_type,
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        // Publish committed events (after append)
        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }
}

fn validate_loaded_stream(
    entity_id: EntityId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Enforce entity isolation even if a buggy backend returns foreign data,
    // and make sure sequence numbers are strictly increasing.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.entity_id != entity_id {
            return Err(DispatchError::EntityIsolation(format!(
                "loaded stream contains wrong entity_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::EntityIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event =
            serde_json::from_value(stored.payload.clone()).map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    use chrono::Utc;
    use easypaies_core::{AbsenceRequestId, EmployeeId, Matricule, PayCode};
    use easypaies_events::InMemoryEventBus;
    use easypaies_payroll::{
        AbsenceDecision, CloseBatch, DecideAbsenceRequest, LEDGER_AGGREGATE_TYPE, LedgerCommand, PayrollLedger,
        RecordBonus, SubmitAbsenceRequest,
    };

    use crate::event_store::InMemoryEventStore;

    type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

    fn dispatcher() -> Dispatcher {
        CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new()))
    }

    fn stream(entity_id: EntityId) -> StreamRef {
        StreamRef {
            entity_id,
            aggregate_id: entity_id.ledger_stream(),
            aggregate_type: LEDGER_AGGREGATE_TYPE,
        }
    }

    fn bonus(matricule: &str, value: f64) -> LedgerCommand {
        LedgerCommand::RecordBonus(RecordBonus {
            matricule: Matricule::parse(matricule).unwrap(),
            code: "P1".into(),
            value,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn committed_events_are_published_after_append() {
        let d = dispatcher();
        let sub = d.bus().subscribe();
        let entity = EntityId::new();

        let committed = d
            .dispatch_append(&stream(entity), bonus("A", 10.0), || PayrollLedger::empty(entity))
            .unwrap();
        assert_eq!(committed.len(), 1);

        let env = sub.try_recv().unwrap();
        assert_eq!(env.entity_id(), entity);
        assert_eq!(env.sequence_number(), 1);
        assert_eq!(env.aggregate_type(), LEDGER_AGGREGATE_TYPE);
    }

    #[test]
    fn rejected_command_appends_and_publishes_nothing() {
        let d = dispatcher();
        let sub = d.bus().subscribe();
        let entity = EntityId::new();

        let err = d
            .dispatch_append(&stream(entity), bonus("A", f64::NAN), || PayrollLedger::empty(entity))
            .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
        assert!(sub.try_recv().is_err());
        assert!(d.store().load_stream(entity, entity.ledger_stream()).unwrap().is_empty());
    }

    #[test]
    fn concurrent_appends_are_never_lost() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 25;

        let d = Arc::new(dispatcher());
        let entity = EntityId::new();

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let d = Arc::clone(&d);
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        d.dispatch_append(&stream(entity), bonus(&format!("M{t}"), i as f64), || {
                            PayrollLedger::empty(entity)
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let ledger = d.load(&stream(entity), || PayrollLedger::empty(entity)).unwrap();
        assert_eq!(ledger.pending_bonuses().len(), THREADS * PER_THREAD);
        assert_eq!(ledger.version(), (THREADS * PER_THREAD) as u64);

        let primes = vec![PayCode::new("P1", "Prime").unwrap()];
        let csv = ledger.prepare_batch(&primes).primes_csv;
        assert_eq!(csv.lines().count(), THREADS + 1);
    }

    #[test]
    fn racing_close_batches_close_once() {
        let d = Arc::new(dispatcher());
        let entity = EntityId::new();
        d.dispatch_append(&stream(entity), bonus("A", 1.0), || PayrollLedger::empty(entity))
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let d = Arc::clone(&d);
                thread::spawn(move || {
                    d.dispatch(
                        &stream(entity),
                        LedgerCommand::CloseBatch(CloseBatch {
                            through_sequence: 1,
                            occurred_at: Utc::now(),
                        }),
                        || PayrollLedger::empty(entity),
                    )
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, DispatchError::InvariantViolation(_))));
    }

    #[test]
    fn deciding_twice_surfaces_invariant_violation() {
        let d = dispatcher();
        let entity = EntityId::new();
        let request_id = AbsenceRequestId::new();
        let today = Utc::now().date_naive();

        d.dispatch_append(
            &stream(entity),
            LedgerCommand::SubmitAbsenceRequest(SubmitAbsenceRequest {
                request_id,
                employee_id: EmployeeId::new(),
                matricule: Matricule::parse("A").unwrap(),
                code: "CP".into(),
                name: "Congés".into(),
                begin_date: today,
                end_date: today,
                documents: vec![],
                occurred_at: Utc::now(),
            }),
            || PayrollLedger::empty(entity),
        )
        .unwrap();

        let approve = || {
            LedgerCommand::DecideAbsenceRequest(DecideAbsenceRequest {
                request_id,
                decision: AbsenceDecision::Approve,
                occurred_at: Utc::now(),
            })
        };
        d.dispatch(&stream(entity), approve(), || PayrollLedger::empty(entity))
            .unwrap();
        let err = d
            .dispatch(&stream(entity), approve(), || PayrollLedger::empty(entity))
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvariantViolation(_)));

        let ledger = d.load(&stream(entity), || PayrollLedger::empty(entity)).unwrap();
        assert_eq!(ledger.pending_absences().len(), 1);
    }
}
