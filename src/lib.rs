// ============================================================================
// stream_relay
// ============================================================================
//
// A health-gated streaming relay: an HTTP readiness probe and a stream
// worker (emitter or receiver) running side by side under a supervisor that
// shares one cancellation token between them.
//
// Structure:
// - config/     - CLI flags and environment
// - health/     - readiness flag and HTTP probe
// - messaging/  - transport traits and the Redpanda (Kafka protocol) client
// - metrics/    - Prometheus registry served next to the probe
// - workers/    - emitter and receiver loops
// - supervisor/ - join-on-first-error lifetime management
// - relay       - wiring of the above
//
// ============================================================================

pub mod config;
pub mod health;
pub mod messaging;
pub mod metrics;
pub mod relay;
pub mod supervisor;
pub mod workers;

pub use relay::{Relay, RelayError, StreamTransport};
