use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use floodgate_common::UnixTimestamp;

/// The time at which the request was received.
///
/// All temporal validation of a request compares against this single instant, so
/// every metric of a batch is judged consistently.
#[derive(Clone, Copy, Debug)]
pub struct ReceivedAt(UnixTimestamp);

impl ReceivedAt {
    /// Returns the receipt timestamp.
    #[inline]
    pub fn into_inner(self) -> UnixTimestamp {
        self.0
    }
}

impl<S> FromRequestParts<S> for ReceivedAt
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(UnixTimestamp::now()))
    }
}
