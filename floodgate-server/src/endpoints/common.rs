//! Common facilities for the ingestion endpoints.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use floodgate_metrics::{ConvertError, ParseMetricsError, ValidationError};

/// The fixed first line of a response body listing validation errors.
pub const ERROR_HEADER: &str = "The following errors have been encountered:";

/// Builds a wire response from its parts.
///
/// This is the single response constructor shared by all endpoint code; it has no
/// hidden state and call sites depend only on this contract.
pub fn build_response(
    status: StatusCode,
    headers: impl IntoIterator<Item = (HeaderName, HeaderValue)>,
    body: impl Into<Body>,
) -> Response {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;

    for (name, value) in headers {
        response.headers_mut().insert(name, value);
    }

    response
}

/// Serializes validation errors into the plain text error body.
///
/// The fixed [`ERROR_HEADER`] line is followed by one error per line.
pub fn error_response_body(errors: &[ValidationError]) -> String {
    let mut body = String::from(ERROR_HEADER);
    body.push('\n');

    for error in errors {
        body.push_str(&error.to_string());
        body.push('\n');
    }

    body
}

/// A request that cannot proceed to persistence.
///
/// Persistence outcomes are not errors; they are mapped to responses directly by
/// the handlers. This type covers everything that fails before submission.
#[derive(Debug, thiserror::Error)]
pub enum BadIngestRequest {
    /// The request body could not be decoded into the expected wire format.
    #[error("cannot parse content")]
    Malformed(#[source] ParseMetricsError),

    /// The batch decoded successfully but contains no metrics at all.
    #[error("empty metrics batch")]
    EmptyBatch,

    /// Every metric in the batch failed validation.
    #[error("no valid metrics in batch")]
    NoValidMetrics(Vec<ValidationError>),

    /// The bundle failed validation, which is fatal for all of its statistics.
    #[error("bundle failed validation")]
    InvalidBundle(Vec<ValidationError>),

    /// Converting a validated bundle failed unexpectedly.
    #[error("failed converting bundle")]
    ConvertFailed(#[source] ConvertError),
}

impl IntoResponse for BadIngestRequest {
    fn into_response(self) -> Response {
        match self {
            // The decoder's message is passed through as a debugging aid.
            Self::Malformed(error) => {
                build_response(StatusCode::BAD_REQUEST, [], error.detail())
            }
            Self::EmptyBatch => build_response(StatusCode::BAD_REQUEST, [], "No valid metrics"),
            Self::NoValidMetrics(errors) | Self::InvalidBundle(errors) => {
                build_response(StatusCode::BAD_REQUEST, [], error_response_body(&errors))
            }
            // Deliberately generic: conversion failures are logged at the call
            // site, the body must not leak internals.
            Self::ConvertFailed(_) => build_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                [],
                "Internal error saving data",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn test_error_response_body() {
        let errors = vec![
            ValidationError {
                metric: "cpu.idle".to_owned(),
                message: "missing metric value".to_owned(),
            },
            ValidationError {
                metric: "cpu.load".to_owned(),
                message: "missing collection time".to_owned(),
            },
        ];

        assert_eq!(
            error_response_body(&errors),
            "The following errors have been encountered:\n\
             'cpu.idle': missing metric value\n\
             'cpu.load': missing collection time\n"
        );
    }

    #[test]
    fn test_build_response_sets_headers() {
        let response = build_response(
            StatusCode::ACCEPTED,
            [(
                HeaderName::from_static("x-floodgate-outcome"),
                HeaderValue::from_static("timeout"),
            )],
            "Timed out persisting metrics",
        );

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            response.headers()["x-floodgate-outcome"],
            HeaderValue::from_static("timeout")
        );
    }
}
