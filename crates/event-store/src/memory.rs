use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

#[derive(Debug, Default)]
struct Log {
    /// Every event in global append order.
    events: Vec<EventEnvelope>,
    /// Current head of each stream.
    heads: HashMap<AggregateId, Version>,
}

/// In-memory event store.
///
/// A single write lock serializes appends, so the version check and the
/// write happen atomically.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.events.len()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let first_version = events[0].version;

        let mut log = self.log.write().await;
        let current = log
            .heads
            .get(&aggregate_id)
            .copied()
            .unwrap_or_else(Version::initial);

        let expected_matches = options
            .expected_version
            .is_none_or(|expected| expected == current);

        if !expected_matches || first_version != current.next() {
            metrics::counter!("event_store_conflicts_total").increment(1);
            tracing::debug!(%aggregate_id, %current, "append rejected by version check");
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version.unwrap_or(current),
                actual: current,
            });
        }

        let head = events
            .last()
            .map(|event| event.version)
            .unwrap_or(current);
        log.events.extend(events);
        log.heads.insert(aggregate_id, head);

        Ok(head)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        Ok(log
            .events
            .iter()
            .filter(|event| event.aggregate_id == aggregate_id)
            .cloned()
            .collect())
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        Ok(self.log.read().await.heads.get(&aggregate_id).copied())
    }

    async fn stream_from(&self, position: u64) -> Result<EventStream> {
        use futures_util::stream;

        let skip = usize::try_from(position).unwrap_or(usize::MAX);
        let events: Vec<EventEnvelope> = self
            .log
            .read()
            .await
            .events
            .iter()
            .skip(skip)
            .cloned()
            .collect();

        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}
