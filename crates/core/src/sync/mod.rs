//! Sync primitives shared by the client and the gateway.

mod debounce;
mod model;
mod rate_gate;
pub mod scheduler;

pub use debounce::{DebounceTarget, Debouncer};
pub use model::*;
pub use rate_gate::*;
