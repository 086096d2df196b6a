use crate::messaging::TransportError;

// ============================================================================
// Stream Worker Errors
// ============================================================================
//
// Only fatal conditions are errors. Transient publish failures and malformed
// deliveries are absorbed by the loops and reflected through readiness.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("could not connect to stream transport: {0}")]
    Connect(#[source] TransportError),

    #[error("could not ensure channel {channel}: {source}")]
    ChannelSetup {
        channel: String,
        #[source]
        source: TransportError,
    },

    #[error("could not subscribe to channel {channel}: {source}")]
    Subscribe {
        channel: String,
        #[source]
        source: TransportError,
    },

    #[error("subscription to channel {channel} closed unexpectedly")]
    SubscriptionClosed { channel: String },
}

impl WorkerError {
    pub(crate) fn channel_setup(channel: &str, source: TransportError) -> Self {
        match source {
            TransportError::Connect(_) => WorkerError::Connect(source),
            source => WorkerError::ChannelSetup {
                channel: channel.to_string(),
                source,
            },
        }
    }

    pub(crate) fn subscribe(channel: &str, source: TransportError) -> Self {
        match source {
            TransportError::Connect(_) => WorkerError::Connect(source),
            source => WorkerError::Subscribe {
                channel: channel.to_string(),
                source,
            },
        }
    }
}
