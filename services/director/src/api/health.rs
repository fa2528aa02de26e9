//! Liveness probe.
//!
//! The probe is the only user-visible failure signal this service has: an
//! external supervisor watches it and restarts the process once the
//! reconcile worker has died. It reports the liveness latch and nothing
//! else.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Probe response body.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// "ok" while the reconcile worker is alive, "failed" once it has
    /// terminated.
    pub status: String,
}

/// Create the probe routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(liveness))
        .route("/healthz", get(liveness))
}

/// Report the liveness latch.
///
/// Returns 200 while the latch is alive and 500 once it has been tripped;
/// the latch never resets, so a "failed" probe stays failed until the
/// process is restarted.
async fn liveness(State(state): State<AppState>) -> impl IntoResponse {
    if state.liveness().is_alive() {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
            }),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HealthResponse {
                status: "failed".to_string(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::LivenessLatch;

    #[tokio::test]
    async fn test_probe_reports_ok_while_alive() {
        let latch = LivenessLatch::new();
        let state = AppState::new(latch);

        let response = liveness(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_probe_reports_failed_after_latch_trips() {
        let latch = LivenessLatch::new();
        let state = AppState::new(latch.clone());

        latch.fail();

        let response = liveness(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
