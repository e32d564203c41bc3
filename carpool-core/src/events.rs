use async_trait::async_trait;
use serde::Serialize;

use crate::repository::StoreResult;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> StoreResult<()>;
}

/// Serialize and publish a domain event.
///
/// Best effort: the mutation the event describes is already committed, so failures are
/// logged and swallowed.
pub async fn publish_event<E: Serialize>(
    publisher: &dyn EventPublisher,
    topic: &str,
    key: &str,
    event: &E,
) {
    let payload = match serde_json::to_string(event) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!("Failed to serialize event for {}: {}", topic, e);
            return;
        }
    };

    if let Err(e) = publisher.publish(topic, key, &payload).await {
        tracing::warn!("Failed to publish event to {}/{}: {}", topic, key, e);
    }
}
