//! Application state model and schema normalization.

mod model;
pub mod schema;

pub use model::*;
pub use schema::{normalize, recognize, RecognizedState};
