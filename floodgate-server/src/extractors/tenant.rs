use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// The optional `tenantId` request header.
///
/// The raw per-metric format carries tenant identity in this header. The
/// aggregated bundle format embeds it in the payload body instead, so absence
/// here is not a transport-level error; the validator rejects metrics without a
/// tenant.
#[derive(Clone, Debug)]
pub struct TenantId(Option<String>);

impl TenantId {
    /// Returns the tenant id, if the header was present and valid.
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for TenantId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant = parts
            .headers
            .get("tenantId")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        Ok(Self(tenant))
    }
}
