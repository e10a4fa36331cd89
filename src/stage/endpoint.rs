//! Downstream endpoints attached to a filter instance.

use crate::config::FilterTaskConfig;
use crate::event::Event;
use crate::stage::metrics::OwnerStats;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Where accepted events for one consumer go.
///
/// Pairs the consumer's inbound sender with the drop-accounting handle of
/// the owner that requested the wiring.
#[derive(Debug, Clone)]
pub struct Endpoint {
    sender: mpsc::Sender<Event>,
    owner: Arc<OwnerStats>,
}

impl Endpoint {
    pub fn new(sender: mpsc::Sender<Event>, owner: Arc<OwnerStats>) -> Self {
        Self { sender, owner }
    }

    /// Create a bounded channel and an endpoint feeding it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use logbeat_filter::Endpoint;
    ///
    /// let (endpoint, _rx) = Endpoint::channel("proc-1", 16);
    /// assert_eq!(endpoint.owner().owner_id(), "proc-1");
    /// ```
    pub fn channel(owner_id: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let owner = Arc::new(OwnerStats::new(owner_id));
        (Self::new(sender, owner), receiver)
    }

    pub fn sender(&self) -> &mpsc::Sender<Event> {
        &self.sender
    }

    pub fn owner(&self) -> &Arc<OwnerStats> {
        &self.owner
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Builds the downstream endpoint for a task config.
///
/// Construction belongs to the processor/output layer; it may fail, in which
/// case nothing is registered or merged.
pub trait EndpointFactory {
    fn build(&self, config: &FilterTaskConfig) -> anyhow::Result<Endpoint>;
}

impl<F> EndpointFactory for F
where
    F: Fn(&FilterTaskConfig) -> anyhow::Result<Endpoint>,
{
    fn build(&self, config: &FilterTaskConfig) -> anyhow::Result<Endpoint> {
        self(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_endpoint_delivers() {
        let (endpoint, mut rx) = Endpoint::channel("out", 4);
        endpoint
            .sender()
            .send(Event::from_line("data", "hello"))
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.text("data"), Some("hello"));
        assert!(!endpoint.is_closed());

        drop(rx);
        assert!(endpoint.is_closed());
    }

    #[test]
    fn test_closure_factory() {
        let factory = |config: &FilterTaskConfig| -> anyhow::Result<Endpoint> {
            Ok(Endpoint::channel(config.processor_id.clone(), 1).0)
        };
        let endpoint = factory.build(&FilterTaskConfig::new("f", "p-9")).unwrap();
        assert_eq!(endpoint.owner().owner_id(), "p-9");
    }

    #[test]
    fn test_failing_factory() {
        let factory = |_: &FilterTaskConfig| -> anyhow::Result<Endpoint> {
            anyhow::bail!("output 'kafka' not configured")
        };
        let err = factory.build(&FilterTaskConfig::new("f", "p")).unwrap_err();
        assert!(err.to_string().contains("kafka"));
    }
}
