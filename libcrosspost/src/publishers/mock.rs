//! Mock publisher for testing
//!
//! Simulates successes, failures, slow platforms and panics without any
//! credentials or network access. Call counts and published content are
//! shared behind `Arc<Mutex<_>>` so clones handed to a crossposter can be
//! inspected afterwards.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::publishers::Publisher;
use crate::types::PublishReceipt;

/// What the mock does when asked to publish
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Succeed,
    Fail(PlatformError),
    Panic(String),
}

/// Shared log of publisher names in the order they were invoked
pub type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Clone)]
pub struct MockPublisher {
    name: String,
    behavior: MockBehavior,
    delay: Duration,
    configured: bool,
    publish_call_count: Arc<Mutex<usize>>,
    published_content: Arc<Mutex<Vec<String>>>,
    call_log: Option<CallLog>,
}

impl MockPublisher {
    pub fn new(name: &str, behavior: MockBehavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            delay: Duration::ZERO,
            configured: true,
            publish_call_count: Arc::new(Mutex::new(0)),
            published_content: Arc::new(Mutex::new(Vec::new())),
            call_log: None,
        }
    }

    pub fn success(name: &str) -> Self {
        Self::new(name, MockBehavior::Succeed)
    }

    pub fn failure(name: &str, error: PlatformError) -> Self {
        Self::new(name, MockBehavior::Fail(error))
    }

    pub fn panicking(name: &str, message: &str) -> Self {
        Self::new(name, MockBehavior::Panic(message.to_string()))
    }

    /// Reports itself unconfigured; publishing still follows `behavior`
    pub fn not_configured(name: &str) -> Self {
        Self {
            configured: false,
            ..Self::success(name)
        }
    }

    /// Sleep for `delay` before completing each publish
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Append this publisher's name to `log` on every publish
    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.call_log = Some(log);
        self
    }

    pub fn publish_call_count(&self) -> usize {
        *self.publish_call_count.lock().unwrap()
    }

    pub fn published_content(&self) -> Vec<String> {
        self.published_content.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn publish(&self, content: &str) -> Result<PublishReceipt> {
        *self.publish_call_count.lock().unwrap() += 1;
        if let Some(log) = &self.call_log {
            log.lock().unwrap().push(self.name.clone());
        }

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match &self.behavior {
            MockBehavior::Succeed => {
                self.published_content
                    .lock()
                    .unwrap()
                    .push(content.to_string());
                let remote_id = format!("{}:mock-{}", self.name, uuid::Uuid::new_v4());
                Ok(PublishReceipt::new(self.name.clone(), Some(remote_id)))
            }
            MockBehavior::Fail(error) => Err(error.clone().into()),
            MockBehavior::Panic(message) => panic!("{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrosspostError;

    #[tokio::test]
    async fn test_mock_success() {
        let publisher = MockPublisher::success("test");

        assert!(publisher.is_configured());
        assert_eq!(publisher.name(), "test");

        let receipt = publisher.publish("Test content").await.unwrap();
        assert_eq!(receipt.platform, "test");
        assert!(receipt.remote_id.unwrap().starts_with("test:mock-"));
        assert_eq!(publisher.publish_call_count(), 1);
        assert_eq!(publisher.published_content(), vec!["Test content"]);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let publisher =
            MockPublisher::failure("test", PlatformError::Network("connection reset".to_string()));

        let result = publisher.publish("Test content").await;
        match result {
            Err(CrosspostError::Platform(PlatformError::Network(msg))) => {
                assert_eq!(msg, "connection reset");
            }
            other => panic!("Expected network error, got {:?}", other),
        }
        assert_eq!(publisher.publish_call_count(), 1);
        assert!(publisher.published_content().is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_counters() {
        let publisher = MockPublisher::success("test");
        let handle = publisher.clone();

        publisher.publish("one").await.unwrap();
        publisher.publish("two").await.unwrap();

        assert_eq!(handle.publish_call_count(), 2);
        assert_eq!(handle.published_content(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_call_log_records_order() {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let first = MockPublisher::success("first").with_call_log(log.clone());
        let second = MockPublisher::success("second").with_call_log(log.clone());

        second.publish("x").await.unwrap();
        first.publish("x").await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_mock_with_delay() {
        let publisher = MockPublisher::success("test").with_delay(Duration::from_millis(50));

        let start = std::time::Instant::now();
        publisher.publish("Test").await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_mock_not_configured() {
        assert!(!MockPublisher::not_configured("test").is_configured());
    }

    #[tokio::test]
    #[should_panic(expected = "boom")]
    async fn test_mock_panicking() {
        let _ = MockPublisher::panicking("test", "boom").publish("x").await;
    }
}
