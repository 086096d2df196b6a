use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::errors::WorkerError;
use crate::health::Readiness;
use crate::messaging::Publisher;
use crate::metrics::RelayMetrics;
use crate::supervisor::{Component, ComponentError};

// ============================================================================
// Emitter - publishes one message per tick
// ============================================================================
//
// Retry policy: a failed publish marks the process not ready and the loop
// simply waits for the next tick. There is no backoff and no limit on
// consecutive failures; the orchestrator decides what to do with a pod that
// stays unhealthy.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmittedMessage {
    pub counter: u64,
    pub emitted_at: DateTime<Utc>,
}

pub struct Emitter {
    publisher: Arc<dyn Publisher>,
    channel: String,
    interval: Duration,
    readiness: Readiness,
    metrics: Arc<RelayMetrics>,
    key: String,
}

impl Emitter {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        channel: impl Into<String>,
        interval: Duration,
        readiness: Readiness,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            publisher,
            channel: channel.into(),
            interval,
            readiness,
            metrics,
            key: Uuid::new_v4().to_string(),
        }
    }

    pub async fn emit(self, shutdown: CancellationToken) -> Result<(), WorkerError> {
        tracing::info!(topic = %self.channel, "Ensuring topic exists");
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::info!("Shutting down emitter before startup completed");
                return Ok(());
            }
            result = self.publisher.ensure_channel(&self.channel) => {
                result.map_err(|e| WorkerError::channel_setup(&self.channel, e))?;
            }
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut counter: u64 = 0;
        let mut last_sequence: Option<u64> = None;

        tracing::info!(
            topic = %self.channel,
            interval_ms = self.interval.as_millis() as u64,
            key = %self.key,
            "Emitter running"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!(emitted = counter, "Shutting down emitter");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            let message = EmittedMessage {
                counter,
                emitted_at: Utc::now(),
            };
            let payload = match serde_json::to_vec(&message) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!(error = %e, counter, "Could not encode message");
                    self.readiness.mark_not_ready();
                    continue;
                }
            };

            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!(emitted = counter, "Shutting down emitter, abandoning in-flight publish");
                    return Ok(());
                }
                result = self.publisher.publish(&self.channel, &self.key, &payload) => result,
            };

            match result {
                Ok(receipt) => {
                    if let Some(previous) = last_sequence {
                        if receipt.sequence < previous {
                            tracing::warn!(
                                previous,
                                sequence = receipt.sequence,
                                "Sequence marker went backwards"
                            );
                        }
                    }
                    last_sequence = Some(receipt.sequence);

                    tracing::info!(
                        topic = %self.channel,
                        counter,
                        sequence = receipt.sequence,
                        partition = receipt.partition,
                        "Published message"
                    );
                    self.metrics.record_publish(Some(receipt.sequence));
                    self.readiness.mark_ready();
                    counter += 1;
                }
                Err(e) => {
                    tracing::error!(topic = %self.channel, counter, error = %e, "Could not publish message");
                    self.metrics.record_publish(None);
                    self.readiness.mark_not_ready();
                }
            }
        }
    }
}

#[async_trait]
impl Component for Emitter {
    fn name(&self) -> &'static str {
        "emitter"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<(), ComponentError> {
        Ok(self.emit(shutdown).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::memory::MemoryTransport;

    fn emitter(transport: &MemoryTransport, readiness: &Readiness) -> Emitter {
        Emitter::new(
            Arc::new(transport.clone()),
            "e2e-topic",
            Duration::from_secs(1),
            readiness.clone(),
            Arc::new(RelayMetrics::new().unwrap()),
        )
    }

    fn decode(payload: &[u8]) -> EmittedMessage {
        serde_json::from_slice(payload).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_ticks_make_ready() {
        let transport = MemoryTransport::new();
        let readiness = Readiness::new();
        let token = CancellationToken::new();
        let task = tokio::spawn(emitter(&transport, &readiness).emit(token.clone()));

        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert!(transport.has_channel("e2e-topic"));
        assert!(readiness.is_ready());
        let published = transport.published();
        assert_eq!(published.len(), 3);
        let counters: Vec<u64> = published.iter().map(|m| decode(&m.payload).counter).collect();
        assert_eq!(counters, vec![0, 1, 2]);

        token.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready_before_first_tick() {
        let transport = MemoryTransport::new();
        let readiness = Readiness::new();
        let token = CancellationToken::new();
        let task = tokio::spawn(emitter(&transport, &readiness).emit(token.clone()));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!readiness.is_ready());
        assert!(transport.published().is_empty());

        token.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_flips_readiness_until_next_success() {
        let transport = MemoryTransport::new();
        let readiness = Readiness::new();
        let token = CancellationToken::new();
        let task = tokio::spawn(emitter(&transport, &readiness).emit(token.clone()));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(readiness.is_ready());

        transport.set_unreachable(true);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!readiness.is_ready());

        transport.set_unreachable(false);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(readiness.is_ready());

        // The failed tick neither consumed a counter value nor was retried early.
        let counters: Vec<u64> = transport
            .published()
            .iter()
            .map(|m| decode(&m.payload).counter)
            .collect();
        assert_eq!(counters, vec![0, 1]);

        token.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequences_are_non_decreasing() {
        let transport = MemoryTransport::new();
        let readiness = Readiness::new();
        let token = CancellationToken::new();
        let task = tokio::spawn(emitter(&transport, &readiness).emit(token.clone()));

        tokio::time::sleep(Duration::from_millis(5500)).await;
        token.cancel();
        task.await.unwrap().unwrap();

        let published = transport.published();
        assert_eq!(published.len(), 5);
        assert!(published.windows(2).all(|w| w[0].sequence <= w[1].sequence));
        assert!(published.windows(2).all(|w| w[0].key == w[1].key));
    }

    #[tokio::test]
    async fn test_channel_setup_failure_is_fatal() {
        let transport = MemoryTransport::new();
        transport.fail_channel_setup();
        let readiness = Readiness::new();

        let err = emitter(&transport, &readiness)
            .emit(CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::ChannelSetup { ref channel, .. } if channel == "e2e-topic"));
        assert!(!readiness.is_ready());
    }

    #[tokio::test]
    async fn test_unreachable_at_startup_is_connect_error() {
        let transport = MemoryTransport::new();
        transport.set_unreachable(true);
        let readiness = Readiness::new();

        let err = emitter(&transport, &readiness)
            .emit(CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::Connect(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_tick_returns_cleanly() {
        let transport = MemoryTransport::new();
        let readiness = Readiness::new();
        let token = CancellationToken::new();
        token.cancel();

        emitter(&transport, &readiness).emit(token).await.unwrap();

        assert!(transport.published().is_empty());
    }
}
