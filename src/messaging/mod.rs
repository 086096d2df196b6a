mod redpanda;
mod transport;

#[cfg(test)]
pub mod memory;

pub use redpanda::{RedpandaPublisher, RedpandaSubscriber};
pub use transport::{
    Delivery, DeliveryMetadata, MalformedDelivery, Publisher, Receipt, Subscriber, Subscription,
    TransportError,
};
