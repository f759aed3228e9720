//! The projection contract and log positions.

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// How far into the global event log a projection has read.
///
/// `events_processed` is also the log offset of the next event to read, so
/// it can be handed straight to `EventStore::stream_from`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProjectionPosition {
    pub events_processed: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::at(0)
    }

    pub fn at(events_processed: u64) -> Self {
        Self { events_processed }
    }

    /// The position after one more event.
    pub fn advance(&self) -> Self {
        Self::at(self.events_processed + 1)
    }

    /// Returns true if the event that moves the log to `next` is still unseen.
    pub fn is_behind(&self, next: ProjectionPosition) -> bool {
        self.events_processed < next.events_processed
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.events_processed)
    }
}

/// Turns log events into a read model.
///
/// The processor calls [`Projection::apply`] with the position the log
/// reaches once `event` is counted. Implementations record that position
/// and must ignore events at or before the one they already hold, so a
/// replayed event never lands twice.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Folds one event into the read model.
    async fn apply(&self, event: &EventEnvelope, position: ProjectionPosition) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Drops all state and rewinds to the start of the log.
    async fn reset(&self) -> Result<()>;
}
