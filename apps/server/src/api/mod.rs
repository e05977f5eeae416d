use std::sync::Arc;

use axum::Router;

use crate::error::ApiError;
use crate::main_lib::GatewayState;

mod sync;

pub fn router() -> Router<Arc<GatewayState>> {
    Router::new().merge(sync::router())
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found".to_string())
}
