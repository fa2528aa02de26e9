//! Process-wide liveness latch.
//!
//! The reconcile worker and the health probe share exactly one piece of
//! state: a flag that starts alive and can transition to dead once. It is
//! never reset; a dead process is expected to be restarted by an external
//! supervisor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One-way alive-to-dead latch.
///
/// Clones share the same underlying cell. Relaxed ordering is sufficient:
/// the flag only ever transitions in one direction, so a stale read merely
/// delays when the probe observes the failure.
#[derive(Debug, Clone, Default)]
pub struct LivenessLatch {
    dead: Arc<AtomicBool>,
}

impl LivenessLatch {
    /// Create a latch in the alive state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while the latch has not been tripped.
    pub fn is_alive(&self) -> bool {
        !self.dead.load(Ordering::Relaxed)
    }

    /// Trip the latch. Idempotent; there is no way back to alive.
    pub fn fail(&self) {
        self.dead.store(true, Ordering::Relaxed);
    }
}
