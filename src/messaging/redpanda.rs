use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    admin::{AdminClient, AdminOptions, NewTopic, TopicReplication},
    client::DefaultClientContext,
    config::ClientConfig,
    consumer::{Consumer, StreamConsumer},
    producer::{FutureProducer, FutureRecord},
    types::RDKafkaErrorCode,
    util::Timeout,
    Message,
};

use super::transport::{Delivery, Publisher, Receipt, Subscriber, Subscription, TransportError};

// ============================================================================
// Redpanda / Kafka-protocol transport
// ============================================================================

const MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);
const ADMIN_TIMEOUT: Duration = Duration::from_secs(5);
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

fn base_config(brokers: &str) -> ClientConfig {
    let mut config = ClientConfig::new();
    config.set("bootstrap.servers", brokers);
    config
}

pub struct RedpandaPublisher {
    producer: FutureProducer,
    admin: AdminClient<DefaultClientContext>,
}

impl RedpandaPublisher {
    pub fn connect(brokers: &str) -> Result<Self, TransportError> {
        let producer: FutureProducer = base_config(brokers)
            .set("message.timeout.ms", MESSAGE_TIMEOUT.as_millis().to_string())
            .create()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let admin: AdminClient<DefaultClientContext> = base_config(brokers)
            .create()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Self { producer, admin })
    }
}

#[async_trait]
impl Publisher for RedpandaPublisher {
    async fn ensure_channel(&self, channel: &str) -> Result<(), TransportError> {
        let topic = NewTopic::new(channel, 1, TopicReplication::Fixed(1));
        let options = AdminOptions::new().request_timeout(Some(ADMIN_TIMEOUT));

        let results = self
            .admin
            .create_topics([&topic], &options)
            .await
            .map_err(|e| TransportError::ChannelSetup {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;

        for result in results {
            match result {
                Ok(name) => tracing::info!(topic = %name, "Created topic"),
                Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    tracing::debug!(topic = %name, "Topic already exists")
                }
                Err((name, code)) => {
                    return Err(TransportError::ChannelSetup {
                        channel: name,
                        reason: code.to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    async fn publish(&self, channel: &str, key: &str, payload: &[u8]) -> Result<Receipt, TransportError> {
        let record = FutureRecord::to(channel).key(key).payload(payload);

        let (partition, offset) = self
            .producer
            .send(record, Timeout::After(MESSAGE_TIMEOUT))
            .await
            .map_err(|(e, _)| TransportError::Publish {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;

        let sequence = u64::try_from(offset).map_err(|_| TransportError::Publish {
            channel: channel.to_string(),
            reason: format!("broker acknowledged without an offset ({offset})"),
        })?;

        Ok(Receipt { partition, sequence })
    }
}

pub struct RedpandaSubscriber {
    brokers: String,
    group: String,
}

impl RedpandaSubscriber {
    pub fn new(brokers: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            group: group.into(),
        }
    }
}

#[async_trait]
impl Subscriber for RedpandaSubscriber {
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>, TransportError> {
        let consumer: StreamConsumer = base_config(&self.brokers)
            .set("group.id", &self.group)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        // Client creation is lazy; a metadata round-trip proves the brokers are reachable.
        let topic = channel.to_string();
        let consumer = tokio::task::spawn_blocking(move || {
            consumer
                .fetch_metadata(Some(&topic), METADATA_TIMEOUT)
                .map(|_| consumer)
        })
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?
        .map_err(|e| TransportError::Connect(e.to_string()))?;

        consumer
            .subscribe(&[channel])
            .map_err(|e| TransportError::Subscribe {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(topic = %channel, group = %self.group, "Subscribed to topic");
        Ok(Box::new(RedpandaSubscription { consumer }))
    }
}

struct RedpandaSubscription {
    consumer: StreamConsumer,
}

#[async_trait]
impl Subscription for RedpandaSubscription {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, TransportError>> {
        let delivery = match self.consumer.recv().await {
            Ok(message) => {
                let delivery = Delivery::new(
                    message.payload().unwrap_or_default(),
                    message.partition(),
                    message.offset(),
                );
                Ok(match message.timestamp().to_millis() {
                    Some(ts) => delivery.with_timestamp(ts),
                    None => delivery,
                })
            }
            Err(e) => Err(TransportError::Delivery(e.to_string())),
        };
        Some(delivery)
    }
}
