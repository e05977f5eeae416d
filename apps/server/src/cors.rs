//! Origin handling.
//!
//! Preflights are always answered with permissive headers so browsers get a
//! well-formed CORS response. Writes from origins outside the allow-list are
//! rejected before they reach a handler. Reads are never blocked; they only
//! carry `Access-Control-Allow-Origin` when the origin is allowed.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::error::ApiError;
use crate::main_lib::GatewayState;

const ALLOW_METHODS: &str = "POST, GET, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";
const MAX_AGE_SECS: &str = "86400";

fn request_origin(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(|origin| origin.trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
}

pub async fn cors(
    State(state): State<Arc<GatewayState>>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request_origin(request.headers()).map(str::to_string);
    let allowed = state.config.origins.allows(origin.as_deref());

    if request.method() == Method::OPTIONS {
        return preflight(origin.as_deref());
    }

    if request.method() == Method::POST && !allowed {
        debug!(
            "[Cors] Rejected write from origin {}",
            origin.as_deref().unwrap_or("<none>")
        );
        let mut response = ApiError::OriginNotAllowed.into_response();
        response
            .headers_mut()
            .insert(header::VARY, HeaderValue::from_static("Origin"));
        return response;
    }

    let mut response = next.run(request).await;
    if allowed {
        let headers = response.headers_mut();
        let value = origin
            .as_deref()
            .and_then(|origin| HeaderValue::from_str(origin).ok())
            .unwrap_or_else(|| HeaderValue::from_static("*"));
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    }
    response
}

fn preflight(origin: Option<&str>) -> Response {
    let allow_origin = origin
        .and_then(|origin| HeaderValue::from_str(origin).ok())
        .unwrap_or_else(|| HeaderValue::from_static("*"));
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOW_METHODS),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOW_HEADERS),
            ),
            (
                header::ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static(MAX_AGE_SECS),
            ),
            (header::VARY, HeaderValue::from_static("Origin")),
        ],
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preflight_echoes_origin() {
        let response = preflight(Some("https://evil.example.org"));
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://evil.example.org"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS);
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
    }

    #[test]
    fn preflight_without_origin_uses_wildcard() {
        let response = preflight(None);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[test]
    fn origin_header_is_trimmed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://a.example/"));
        assert_eq!(request_origin(&headers), Some("https://a.example"));
        assert_eq!(request_origin(&HeaderMap::new()), None);
    }
}
