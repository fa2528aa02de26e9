//! Application state shared across request handlers.

use std::sync::Arc;

use crate::liveness::LivenessLatch;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor. The
/// health surface only ever reads the liveness latch.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    liveness: LivenessLatch,
}

impl AppState {
    /// Create a new application state.
    pub fn new(liveness: LivenessLatch) -> Self {
        Self {
            inner: Arc::new(AppStateInner { liveness }),
        }
    }

    /// Get the liveness latch handle.
    pub fn liveness(&self) -> &LivenessLatch {
        &self.inner.liveness
    }
}
