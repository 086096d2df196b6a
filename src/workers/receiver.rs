use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::errors::WorkerError;
use crate::health::Readiness;
use crate::messaging::{Delivery, Subscriber, TransportError};
use crate::metrics::RelayMetrics;
use crate::supervisor::{Component, ComponentError};

// ============================================================================
// Receiver - subscribes to a channel and handles each delivery once
// ============================================================================
//
// Acknowledgement and redelivery belong to the transport. A delivery whose
// metadata cannot be read, or a per-delivery transport error, marks the
// process not ready and the loop keeps going.
//
// ============================================================================

pub struct Receiver {
    subscriber: Arc<dyn Subscriber>,
    channel: String,
    readiness: Readiness,
    metrics: Arc<RelayMetrics>,
}

impl Receiver {
    pub fn new(
        subscriber: Arc<dyn Subscriber>,
        channel: impl Into<String>,
        readiness: Readiness,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            subscriber,
            channel: channel.into(),
            readiness,
            metrics,
        }
    }

    pub async fn receive(self, shutdown: CancellationToken) -> Result<(), WorkerError> {
        let mut subscription = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::info!("Shutting down receiver before subscription completed");
                return Ok(());
            }
            result = self.subscriber.subscribe(&self.channel) => {
                result.map_err(|e| WorkerError::subscribe(&self.channel, e))?
            }
        };
        tracing::info!(topic = %self.channel, "Receiver running");

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!(topic = %self.channel, "Shutting down receiver");
                    return Ok(());
                }
                next = subscription.next_delivery() => next,
            };

            match next {
                Some(delivery) => self.handle(delivery),
                None => {
                    self.readiness.mark_not_ready();
                    return Err(WorkerError::SubscriptionClosed {
                        channel: self.channel.clone(),
                    });
                }
            }
        }
    }

    fn handle(&self, delivery: Result<Delivery, TransportError>) {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                tracing::error!(topic = %self.channel, error = %e, "Delivery failed at the transport");
                self.metrics.record_delivery(false);
                self.readiness.mark_not_ready();
                return;
            }
        };

        match delivery.metadata() {
            Ok(metadata) => {
                tracing::info!(
                    data = %delivery.payload_lossy(),
                    sequence = metadata.sequence,
                    partition = metadata.partition,
                    timestamp_ms = ?metadata.timestamp_ms,
                    "Received message"
                );
                self.metrics.record_delivery(true);
                self.readiness.mark_ready();
            }
            Err(e) => {
                tracing::error!(topic = %self.channel, error = %e, "Unexpected message without metadata");
                self.metrics.record_delivery(false);
                self.readiness.mark_not_ready();
            }
        }
    }
}

#[async_trait]
impl Component for Receiver {
    fn name(&self) -> &'static str {
        "receiver"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<(), ComponentError> {
        Ok(self.receive(shutdown).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::memory::MemoryTransport;
    use crate::messaging::Publisher;
    use std::time::Duration;

    struct Harness {
        transport: MemoryTransport,
        readiness: Readiness,
        metrics: Arc<RelayMetrics>,
        token: CancellationToken,
        task: tokio::task::JoinHandle<Result<(), WorkerError>>,
    }

    async fn start() -> Harness {
        let transport = MemoryTransport::new();
        let readiness = Readiness::new();
        let metrics = Arc::new(RelayMetrics::new().unwrap());
        let token = CancellationToken::new();

        let receiver = Receiver::new(
            Arc::new(transport.clone()),
            "e2e-topic",
            readiness.clone(),
            metrics.clone(),
        );
        let task = tokio::spawn(receiver.receive(token.clone()));
        wait_until(|| transport.subscriber_count("e2e-topic") == 1).await;

        Harness {
            transport,
            readiness,
            metrics,
            token,
            task,
        }
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_readiness_follows_last_delivery() {
        let h = start().await;
        assert!(!h.readiness.is_ready());

        for i in 0..3 {
            h.transport
                .deliver("e2e-topic", Ok(Delivery::new(format!("message {i}"), 0, i)));
        }
        wait_until(|| h.metrics.messages_received.get() == 3).await;
        assert!(h.readiness.is_ready());

        h.transport.deliver("e2e-topic", Ok(Delivery::new("no offset", 0, -1)));
        wait_until(|| h.metrics.malformed_deliveries.get() == 1).await;
        assert!(!h.readiness.is_ready());

        h.transport.deliver("e2e-topic", Ok(Delivery::new("again", 0, 3)));
        wait_until(|| h.metrics.messages_received.get() == 4).await;
        assert!(h.readiness.is_ready());

        h.token.cancel();
        h.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_transport_delivery_error_is_not_fatal() {
        let h = start().await;

        h.transport.deliver(
            "e2e-topic",
            Err(TransportError::Delivery("broker went away".to_string())),
        );
        wait_until(|| h.metrics.malformed_deliveries.get() == 1).await;
        assert!(!h.readiness.is_ready());
        assert!(!h.task.is_finished());

        h.transport.deliver("e2e-topic", Ok(Delivery::new("recovered", 0, 0)));
        wait_until(|| h.readiness.is_ready()).await;

        h.token.cancel();
        h.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_receives_what_the_emitter_side_publishes() {
        let h = start().await;

        h.transport.publish("e2e-topic", "key", b"{\"counter\":0}").await.unwrap();
        h.transport.publish("other-topic", "key", b"ignored").await.unwrap();
        wait_until(|| h.readiness.is_ready()).await;
        assert_eq!(h.metrics.messages_received.get(), 1);

        h.token.cancel();
        h.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_failure_is_fatal() {
        let transport = MemoryTransport::new();
        transport.fail_subscribe();
        let receiver = Receiver::new(
            Arc::new(transport),
            "e2e-topic",
            Readiness::new(),
            Arc::new(RelayMetrics::new().unwrap()),
        );

        let err = receiver.receive(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, WorkerError::Subscribe { .. }));
    }

    #[tokio::test]
    async fn test_closed_subscription_is_fatal() {
        let h = start().await;
        h.transport.deliver("e2e-topic", Ok(Delivery::new("one", 0, 0)));
        wait_until(|| h.readiness.is_ready()).await;

        h.transport.close_subscriptions();

        let err = h.task.await.unwrap().unwrap_err();
        assert!(matches!(err, WorkerError::SubscriptionClosed { .. }));
        assert!(!h.readiness.is_ready());
    }
}
