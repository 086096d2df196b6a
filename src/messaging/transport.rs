use async_trait::async_trait;

// ============================================================================
// Stream Transport Abstractions
// ============================================================================
//
// The workers only ever talk to these traits. The Kafka-protocol client in
// `redpanda.rs` is the production implementation.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not connect to stream transport: {0}")]
    Connect(String),

    #[error("could not create channel {channel}: {reason}")]
    ChannelSetup { channel: String, reason: String },

    #[error("could not subscribe to channel {channel}: {reason}")]
    Subscribe { channel: String, reason: String },

    #[error("could not publish to channel {channel}: {reason}")]
    Publish { channel: String, reason: String },

    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Metadata the transport attaches to an accepted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub partition: i32,
    pub sequence: u64,
}

/// A message handed to the receiver by the transport.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub payload: Vec<u8>,
    pub partition: i32,
    pub offset: i64,
    pub timestamp_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryMetadata {
    pub partition: i32,
    pub sequence: u64,
    pub timestamp_ms: Option<i64>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MalformedDelivery {
    #[error("delivery has no valid partition (got {0})")]
    InvalidPartition(i32),

    #[error("delivery has no valid sequence (got offset {0})")]
    InvalidSequence(i64),
}

impl Delivery {
    pub fn new(payload: impl Into<Vec<u8>>, partition: i32, offset: i64) -> Self {
        Self {
            payload: payload.into(),
            partition,
            offset,
            timestamp_ms: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// Extract the delivery metadata. Negative partitions or offsets are the
    /// transport's sentinel for "unknown" and make the delivery malformed.
    pub fn metadata(&self) -> Result<DeliveryMetadata, MalformedDelivery> {
        if self.partition < 0 {
            return Err(MalformedDelivery::InvalidPartition(self.partition));
        }
        let sequence =
            u64::try_from(self.offset).map_err(|_| MalformedDelivery::InvalidSequence(self.offset))?;

        Ok(DeliveryMetadata {
            partition: self.partition,
            sequence,
            timestamp_ms: self.timestamp_ms,
        })
    }

    pub fn payload_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Create the channel unless it already exists.
    async fn ensure_channel(&self, channel: &str) -> Result<(), TransportError>;

    async fn publish(&self, channel: &str, key: &str, payload: &[u8]) -> Result<Receipt, TransportError>;
}

#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>, TransportError>;
}

#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next delivery. `None` means the subscription ended.
    async fn next_delivery(&mut self) -> Option<Result<Delivery, TransportError>>;
}
