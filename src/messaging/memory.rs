use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::transport::{Delivery, Publisher, Receipt, Subscriber, Subscription, TransportError};

// ============================================================================
// In-memory transport with failure injection, for tests
// ============================================================================

#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub channel: String,
    pub key: String,
    pub payload: Vec<u8>,
    pub sequence: u64,
}

#[derive(Default)]
struct State {
    channels: HashSet<String>,
    published: Vec<PublishedMessage>,
    next_sequence: u64,
    unreachable: bool,
    fail_channel_setup: bool,
    fail_subscribe: bool,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<Result<Delivery, TransportError>>>>,
}

#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<State>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    pub fn fail_channel_setup(&self) {
        self.state().fail_channel_setup = true;
    }

    pub fn fail_subscribe(&self) {
        self.state().fail_subscribe = true;
    }

    pub fn has_channel(&self, channel: &str) -> bool {
        self.state().channels.contains(channel)
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state().published.clone()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.state().subscribers.get(channel).map_or(0, Vec::len)
    }

    /// Push a raw delivery (or delivery error) to every subscriber of `channel`.
    pub fn deliver(&self, channel: &str, delivery: Result<Delivery, TransportError>) {
        let mut state = self.state();
        if let Some(senders) = state.subscribers.get_mut(channel) {
            senders.retain(|tx| {
                let item = match &delivery {
                    Ok(d) => Ok(d.clone()),
                    Err(e) => Err(TransportError::Delivery(e.to_string())),
                };
                tx.send(item).is_ok()
            });
        }
    }

    /// Drop every subscription so receivers observe the end of their stream.
    pub fn close_subscriptions(&self) {
        self.state().subscribers.clear();
    }
}

#[async_trait]
impl Publisher for MemoryTransport {
    async fn ensure_channel(&self, channel: &str) -> Result<(), TransportError> {
        let mut state = self.state();
        if state.unreachable {
            return Err(TransportError::Connect("transport unreachable".to_string()));
        }
        if state.fail_channel_setup {
            return Err(TransportError::ChannelSetup {
                channel: channel.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        state.channels.insert(channel.to_string());
        Ok(())
    }

    async fn publish(&self, channel: &str, key: &str, payload: &[u8]) -> Result<Receipt, TransportError> {
        let mut state = self.state();
        if state.unreachable {
            return Err(TransportError::Publish {
                channel: channel.to_string(),
                reason: "transport unreachable".to_string(),
            });
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.published.push(PublishedMessage {
            channel: channel.to_string(),
            key: key.to_string(),
            payload: payload.to_vec(),
            sequence,
        });

        if let Some(senders) = state.subscribers.get_mut(channel) {
            let offset = i64::try_from(sequence).unwrap_or(i64::MAX);
            senders.retain(|tx| tx.send(Ok(Delivery::new(payload, 0, offset))).is_ok());
        }

        Ok(Receipt { partition: 0, sequence })
    }
}

#[async_trait]
impl Subscriber for MemoryTransport {
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>, TransportError> {
        let mut state = self.state();
        if state.unreachable {
            return Err(TransportError::Connect("transport unreachable".to_string()));
        }
        if state.fail_subscribe {
            return Err(TransportError::Subscribe {
                channel: channel.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.entry(channel.to_string()).or_default().push(tx);
        Ok(Box::new(MemorySubscription { rx }))
    }
}

struct MemorySubscription {
    rx: mpsc::UnboundedReceiver<Result<Delivery, TransportError>>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, TransportError>> {
        self.rx.recv().await
    }
}
