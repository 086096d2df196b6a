use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ============================================================================
// Readiness Flag
// ============================================================================
//
// Process-wide readiness shared between the stream worker (sole writer) and
// the health reporter (sole reader). It only ever reflects the outcome of the
// most recent stream operation.
//
// ============================================================================

/// Cloneable handle over a single atomic readiness flag.
///
/// Every clone observes the same flag. A fresh handle starts as not ready.
#[derive(Debug, Clone, Default)]
pub struct Readiness {
    ready: Arc<AtomicBool>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_ready(&self) {
        self.set(true);
    }

    pub fn mark_not_ready(&self) {
        self.set(false);
    }

    pub fn set(&self, ready: bool) {
        let previous = self.ready.swap(ready, Ordering::AcqRel);
        if previous != ready {
            tracing::debug!(ready, "Readiness changed");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}
