//! Storage sink contract.

use async_trait::async_trait;
use pulse_core::Result;

use crate::batch::EventBatch;

/// Destination for flushed batches.
///
/// One call is one bulk write. Implementations do not retry; a failure is
/// reported once and the collector discards the batch.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn write(&self, batch: EventBatch) -> Result<()>;
}
