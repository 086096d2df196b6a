// ============================================================================
// Health Module
// ============================================================================
//
// - readiness - the shared flag written by the stream worker
// - server    - HTTP probe (and /metrics) reading it
//
// ============================================================================

mod errors;
mod readiness;
mod server;

pub use errors::HealthError;
pub use readiness::Readiness;
pub use server::{HealthConfig, HealthReporter};
