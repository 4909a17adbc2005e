use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("broker connect timed out after {0}ms")]
    ConnectTimeout(u64),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Fire-and-forget fan-out of realtime events.
///
/// Implementations deliver `payload` to whoever is subscribed to `channel` at
/// the moment of publishing; nothing is retained for later subscribers.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError>;

    /// Whether the last interaction with the broker succeeded.
    fn is_connected(&self) -> bool {
        true
    }
}

/// In-process publisher that records every event, for tests.
#[derive(Default)]
pub struct MemoryBroker {
    published: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn published_on(&self, channel: &str) -> Vec<serde_json::Value> {
        self.published()
            .into_iter()
            .filter(|(c, _)| c == channel)
            .filter_map(|(_, payload)| serde_json::from_str(&payload).ok())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for MemoryBroker {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable("memory broker switched off".into()));
        }
        let mut events = self
            .published
            .lock()
            .map_err(|_| BrokerError::Unavailable("memory broker poisoned".into()))?;
        events.push((channel.to_string(), payload.to_string()));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.failing.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_broker_records_in_order() {
        let broker = MemoryBroker::new();
        broker.publish("a", "1").await.unwrap();
        broker.publish("b", "2").await.unwrap();

        assert_eq!(
            broker.published(),
            vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failing_broker_rejects_and_records_nothing() {
        let broker = MemoryBroker::new();
        broker.set_failing(true);

        assert!(broker.publish("a", "1").await.is_err());
        assert!(broker.published().is_empty());
        assert!(!broker.is_connected());
    }
}
