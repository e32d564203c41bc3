use async_trait::async_trait;
use carpool_core::events::EventPublisher;
use carpool_core::StoreResult;
use tracing::info;

/// Writes domain events to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventPublisher;

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> StoreResult<()> {
        info!(topic, key, payload, "Published event");
        Ok(())
    }
}
