//! Feeds the global event log into registered projections.

use event_store::EventStore;
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};

/// Reads the event log from the slowest registered projection onward and
/// hands every event to each projection that has not yet seen it.
///
/// Catch-up runs are serialized: two callers racing to refresh the read side
/// would otherwise read the same starting positions.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    catch_up: Mutex<()>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            catch_up: Mutex::new(()),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Brings every projection up to the head of the log.
    ///
    /// Returns the number of events read from the store.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let _guard = self.catch_up.lock().await;

        let mut positions = Vec::with_capacity(self.projections.len());
        for projection in &self.projections {
            positions.push(projection.position().await);
        }
        let Some(start) = positions.iter().min().copied() else {
            return Ok(0);
        };

        let mut stream = self.store.stream_from(start.events_processed).await?;
        let mut position = start;
        let mut read = 0;

        while let Some(event) = stream.next().await {
            let event = event?;
            position = position.advance();
            read += 1;

            for (projection, seen) in self.projections.iter().zip(&positions) {
                if seen.is_behind(position) {
                    projection.apply(&event, position).await?;
                    metrics::counter!(
                        "projection_events_applied_total",
                        "projection" => projection.name()
                    )
                    .increment(1);
                }
            }
        }

        if read > 0 {
            tracing::debug!(from = %start, to = %position, "catch-up complete");
        }
        Ok(read)
    }

    /// Rewinds every projection and replays the whole log.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            projection.reset().await?;
            tracing::info!(projection = projection.name(), "projection reset");
        }
        self.run_catch_up().await
    }

    /// Lowest position among the registered projections.
    pub async fn position(&self) -> ProjectionPosition {
        let mut lowest: Option<ProjectionPosition> = None;
        for projection in &self.projections {
            let pos = projection.position().await;
            lowest = Some(lowest.map_or(pos, |current| current.min(pos)));
        }
        lowest.unwrap_or_default()
    }
}
