//! Response policy and error bodies.
//!
//! # Responsibilities
//! - Attach security headers to every response in strict mode
//! - Render errors as a minimal JSON body
//! - Turn handler panics into a generic 500
//!
//! # Design Decisions
//! - Error bodies never carry internal detail (no paths, no panic payloads)
//! - Security headers wrap the whole router, so 404/405/408 get them too

use std::any::Any;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::set_header::SetResponseHeaderLayer;

pub const CONTENT_SECURITY_POLICY: &str =
    "default-src 'self'; frame-ancestors 'none'; form-action 'self';";
pub const CONTENT_TYPE_OPTIONS: &str = "nosniff";
pub const CACHE_CONTROL: &str = "max-age=0, must-revalidate, no-cache, no-store, private";

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    status: u16,
}

/// JSON error response: `{"error": "...", "status": N}`.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message,
            status: status.as_u16(),
        }),
    )
        .into_response()
}

/// Panic handler for `CatchPanicLayer`.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "Handler panicked");

    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
}

/// Wrap a router with the strict-mode security response headers.
pub fn with_security_headers(router: Router) -> Router {
    router
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static(CONTENT_TYPE_OPTIONS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL),
        ))
}
