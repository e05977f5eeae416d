//! LinkHub core: application state, schema normalization, the local state
//! cache and the sync primitives shared by the client and the gateway.

pub mod cache;
pub mod errors;
pub mod import;
pub mod settings;
pub mod state;
pub mod storage;
pub mod sync;

pub use cache::LocalStateCache;
pub use errors::{Error, Result};
pub use state::{AppState, Collection, Record};
pub use storage::KeyValueStore;
