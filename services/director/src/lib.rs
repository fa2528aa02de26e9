//! seedfill director
//!
//! Keeps multiplayer game servers above a minimum population by assigning
//! a bounded pool of automated seeder clients to under-populated servers,
//! and withdrawing them as real players fill the gap.
//!
//! ## Architecture
//!
//! - **Reconcile worker**: drives one reconciliation pass over all fill
//!   groups per tick, strictly sequentially
//! - **Assignment reconciler**: telemetry + seeder registry + existing
//!   assignments -> next assignment map, pruned and filled
//! - **Telemetry client**: per-server occupancy from the upstream
//!   server-browser API, with bounded retry and degrade-to-safe
//! - **State store**: groups, seeder registry, and the persisted
//!   assignment maps, behind a narrow contract
//! - **Health probe**: reports the worker's one-way liveness latch

pub mod api;
pub mod config;
pub mod liveness;
pub mod reconciler;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod worker;
