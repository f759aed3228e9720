//! Append-only event log.
//!
//! Orders are persisted as streams of events. Each append names the version
//! it expects the stream to be at, so two writers racing on the same order
//! cannot both commit.

pub mod error;
pub mod event;
pub mod memory;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
