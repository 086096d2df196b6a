// ============================================================================
// Stream Workers
// ============================================================================
//
// One worker per role. Both are the sole writers of the process readiness.
//
// ============================================================================

mod emitter;
mod errors;
mod receiver;

pub use emitter::{EmittedMessage, Emitter};
pub use errors::WorkerError;
pub use receiver::Receiver;
