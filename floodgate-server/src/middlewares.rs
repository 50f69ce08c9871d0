use std::any::Any;

use axum::http::StatusCode;
use axum::response::Response;

use crate::endpoints::common::build_response;

/// Converts a handler panic into the generic internal error response.
///
/// The panic message is logged with full detail; the response body stays generic
/// so that internals never leak to clients.
pub fn handle_panic(error: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = error.downcast_ref::<String>() {
        message.as_str()
    } else if let Some(message) = error.downcast_ref::<&str>() {
        message
    } else {
        "unknown panic"
    };

    floodgate_log::error!(panic = detail, "request handler panicked");

    build_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        [],
        "Internal error saving data",
    )
}
