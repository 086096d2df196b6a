use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

// ============================================================================
// Metrics Module - Prometheus metrics for the relay
// ============================================================================
//
// Counters for both roles live in one registry; a process only ever moves
// the ones belonging to its role. Scraped through GET /metrics on the
// health server.
//
// ============================================================================

pub struct RelayMetrics {
    registry: Registry,

    // Emitter
    pub messages_published: IntCounter,
    pub publish_failures: IntCounter,
    pub last_sequence: IntGauge,

    // Receiver
    pub messages_received: IntCounter,
    pub malformed_deliveries: IntCounter,

    pub ready: IntGauge,
}

impl RelayMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let messages_published = IntCounter::new(
            "relay_messages_published_total",
            "Total messages accepted by the stream transport",
        )?;
        registry.register(Box::new(messages_published.clone()))?;

        let publish_failures = IntCounter::new(
            "relay_publish_failures_total",
            "Total publish attempts rejected or not acknowledged",
        )?;
        registry.register(Box::new(publish_failures.clone()))?;

        let last_sequence = IntGauge::new(
            "relay_last_sequence",
            "Sequence marker assigned to the most recently accepted message",
        )?;
        registry.register(Box::new(last_sequence.clone()))?;

        let messages_received = IntCounter::new(
            "relay_messages_received_total",
            "Total deliveries handled successfully",
        )?;
        registry.register(Box::new(messages_received.clone()))?;

        let malformed_deliveries = IntCounter::new(
            "relay_malformed_deliveries_total",
            "Total deliveries without usable metadata or failed at the transport",
        )?;
        registry.register(Box::new(malformed_deliveries.clone()))?;

        let ready = IntGauge::new("relay_ready", "Readiness at scrape time (0=not ready, 1=ready)")?;
        registry.register(Box::new(ready.clone()))?;

        Ok(Self {
            registry,
            messages_published,
            publish_failures,
            last_sequence,
            messages_received,
            malformed_deliveries,
            ready,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_publish(&self, sequence: Option<u64>) {
        match sequence {
            Some(sequence) => {
                self.messages_published.inc();
                self.last_sequence.set(i64::try_from(sequence).unwrap_or(i64::MAX));
            }
            None => self.publish_failures.inc(),
        }
    }

    pub fn record_delivery(&self, well_formed: bool) {
        if well_formed {
            self.messages_received.inc();
        } else {
            self.malformed_deliveries.inc();
        }
    }

    /// Encode every registered metric in the Prometheus text format.
    pub fn encode(&self, ready: bool) -> prometheus::Result<Vec<u8>> {
        self.ready.set(i64::from(ready));

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}
