//! LinkHub sync gateway.
//!
//! Accepts aggregate pushes, splits them into per-collection files and writes
//! each one to a versioned file store with optimistic concurrency. Serves the
//! combined state and the individual files back to clients.

pub mod api;
pub mod config;
pub mod cors;
pub mod error;
pub mod main_lib;
pub mod store;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use config::{Args, GatewayConfig, OriginPolicy};
pub use main_lib::{app_router, build_state, GatewayState};
