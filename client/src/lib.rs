//! # Client-State Synchronization Engine
//!
//! This library hides network latency and jitter behind a believable local
//! view of a server-authoritative world. The server owns the truth about
//! every entity's position and rotation; the client's job is to make that
//! truth feel immediate for the local player and smooth for everyone else,
//! while guaranteeing eventual convergence with no visible snapping or
//! accumulated drift.
//!
//! ## Architecture Overview
//!
//! ### Fixed-Timestep Simulation
//! The scheduler decouples simulation from rendering: wall time accumulates
//! per render frame and whole tick intervals are drained at a constant rate,
//! so prediction stays deterministic whether the host renders at 30Hz or
//! 144Hz.
//!
//! ### Client-Side Prediction
//! Each tick's input is applied to the local entity immediately, using the
//! same movement rule the server runs. Applied inputs wait in a pending
//! buffer until the server acknowledges them; post-tick state lands in a
//! fixed-capacity history ring for diagnostics.
//!
//! ### Server Reconciliation
//! Authoritative snapshots prune acknowledged inputs and compare server
//! truth against the prediction. Divergence beyond tolerance, or an explicit
//! correction message, snaps the local transform to the server values and
//! clears the pending buffer, bounding drift at one round trip.
//!
//! ### Remote Interpolation
//! Remote entities render from a small buffer of timestamped snapshots:
//! linear interpolation between the two newest, a smoothed-velocity dead
//! reckoning term to cover gaps between packets, and a final exponential
//! chase that absorbs arrival jitter.
//!
//! ## Module Organization
//!
//! - `input` — control-state sampling at tick boundaries
//! - `scheduler` — fixed-timestep accumulator with stall clamping
//! - `prediction` — local predictor, pending-input buffer, state history
//! - `reconciliation` — acknowledgment pruning and correction snapping
//! - `interpolation` — per-entity snapshot buffers and smoothing
//! - `engine` — one `SyncEngine` per connection, routing packets to the
//!   component that owns them
//! - `network` — tokio UDP adapter; the only async code in the crate

pub mod engine;
pub mod input;
pub mod interpolation;
pub mod network;
pub mod prediction;
pub mod reconciliation;
pub mod scheduler;
