//! Batch orchestration engine for provider record verification.
//!
//! Clients submit a batch of provider records, the scheduler fans each
//! record out through a fixed four-stage analysis pipeline under a bounded
//! concurrency limit, and clients poll a consistent snapshot until the
//! batch reaches a terminal state.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod roster;
pub mod telemetry;
