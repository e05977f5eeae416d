//! Client side of LinkHub remote sync: the gateway HTTP client and the
//! service that connects it to the local state cache.

pub mod client;
pub mod endpoint;
pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod test_support;

pub use client::{SyncClient, SyncClientConfig};
pub use endpoint::Endpoint;
pub use error::{RemoteSyncError, Result};
pub use service::{LogNotifier, SyncEvent, SyncNotifier, SyncService};
pub use types::*;
