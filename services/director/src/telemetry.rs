//! Live server telemetry.
//!
//! Fetches occupancy and capacity for one game server from the upstream
//! server-browser API. The upstream is unreliable, so every fetch runs
//! under a bounded retry policy and, when the budget is spent, degrades to
//! an empty snapshot instead of surfacing an error: a dead upstream must
//! never block reconciliation, and the negative `needed_players` of the
//! degraded snapshot makes the reconciler shed seeders for that server
//! rather than add more.

use std::time::Duration;

use async_trait::async_trait;
use seedfill_retry::RetryPolicy;
use serde::Deserialize;
use tracing::{debug, warn};

/// Default upstream endpoint for detailed server queries.
pub const DEFAULT_TELEMETRY_URL: &str = "https://api.gametools.network/bf1/detailedserver/";

/// Default retry budget: one initial attempt plus twenty retries.
pub const DEFAULT_RETRY_POLICY: RetryPolicy = RetryPolicy::new(21, Duration::from_secs(10));

/// Occupancy snapshot for one game server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTelemetry {
    /// Server player capacity.
    pub max_players: i64,

    /// Players currently on the server.
    pub current_players: i64,

    /// Headroom left for seeders: capacity minus current players minus the
    /// space reserved for real players. May be negative.
    pub needed_players: i64,

    /// Players waiting in the join queue.
    pub queue_length: i64,

    /// Upstream identifier of the running game session.
    pub game_id: String,

    /// Number of seeders currently assigned to this server, echoed from the
    /// caller and adjusted during pruning.
    pub used_seeders: usize,
}

impl ServerTelemetry {
    /// Snapshot used when the upstream cannot be reached.
    ///
    /// Zero capacity and zero players leave `needed_players` at
    /// `-empty_space`, which is always negative for a sane configuration.
    pub fn degraded(empty_space: i64, used_seeders: usize) -> Self {
        Self {
            max_players: 0,
            current_players: 0,
            needed_players: -empty_space,
            queue_length: 0,
            game_id: String::new(),
            used_seeders,
        }
    }
}

/// Source of per-server telemetry.
///
/// Infallible by contract: implementations degrade internally rather than
/// propagate upstream failures.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Fetch a snapshot for `server_name`.
    ///
    /// `empty_space` is the capacity reserved for real players and
    /// `used_seeders` the caller's current assignment count for the server.
    async fn fetch(&self, server_name: &str, empty_space: i64, used_seeders: usize)
        -> ServerTelemetry;
}

/// Telemetry client configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Upstream endpoint URL.
    pub base_url: String,

    /// Per-request timeout.
    pub request_timeout: Duration,

    /// Retry budget applied around each fetch.
    pub retry: RetryPolicy,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TELEMETRY_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            retry: DEFAULT_RETRY_POLICY,
        }
    }
}

/// Raw upstream payload.
///
/// Every field is optional upstream; missing fields decode to zero or the
/// empty string rather than failing.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DetailedServerResponse {
    max_player_amount: i64,
    player_amount: i64,
    in_queue: i64,
    game_id: String,
}

/// HTTP telemetry client for the server-browser API.
pub struct TelemetryClient {
    client: reqwest::Client,
    config: TelemetryConfig,
}

impl TelemetryClient {
    /// Create a new client.
    pub fn new(config: TelemetryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self { client, config }
    }

    /// Issue a single upstream query.
    ///
    /// Transport failures, non-success statuses, and malformed bodies all
    /// surface as errors here; the retry wrapper treats them uniformly.
    async fn query(&self, server_name: &str) -> Result<DetailedServerResponse, reqwest::Error> {
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("name", server_name),
                ("lang", "en-us"),
                ("platform", "pc"),
            ])
            .send()
            .await?
            .error_for_status()?;

        response.json().await
    }
}

#[async_trait]
impl TelemetrySource for TelemetryClient {
    async fn fetch(
        &self,
        server_name: &str,
        empty_space: i64,
        used_seeders: usize,
    ) -> ServerTelemetry {
        let result = self
            .config
            .retry
            .run(|attempt| {
                if attempt > 1 {
                    debug!(server = server_name, attempt, "Retrying telemetry query");
                }
                self.query(server_name)
            })
            .await;

        match result {
            Ok(raw) => ServerTelemetry {
                max_players: raw.max_player_amount,
                current_players: raw.player_amount,
                needed_players: raw.max_player_amount - (raw.player_amount + empty_space),
                queue_length: raw.in_queue,
                game_id: raw.game_id,
                used_seeders,
            },
            Err(e) => {
                warn!(
                    server = server_name,
                    attempts = e.attempts,
                    error = %e.last_error,
                    "Telemetry unavailable, degrading to empty snapshot"
                );
                ServerTelemetry::degraded(empty_space, used_seeders)
            }
        }
    }
}
