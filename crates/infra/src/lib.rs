//! Infrastructure layer: event store, command dispatch, record storage,
//! projections, outbound mail and document storage.

pub mod command_dispatcher;
pub mod event_store;
pub mod notify;
pub mod projections;
pub mod record_store;
pub mod storage;
pub mod workers;

pub use command_dispatcher::{CommandDispatcher, DispatchError, StreamRef};
pub use record_store::{InMemoryRecordStore, RecordStore};
