//! Acting-identity extraction.
//!
//! Authentication happens upstream. The session layer forwards the
//! authenticated identity in the [`OWNER_HEADER`] header and this crate only
//! ever compares identities for equality.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use crate::domain::OwnerId;
use crate::error::KeepsakeError;

/// Header carrying the authenticated owner identity.
pub const OWNER_HEADER: &str = "x-owner-id";

/// The authenticated owner making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerIdentity(pub OwnerId);

impl OwnerIdentity {
    /// Reads the identity from request headers, if present and non-blank.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Self(OwnerId::new(v)))
    }
}

impl<S> FromRequestParts<S> for OwnerIdentity
where
    S: Send + Sync,
{
    type Rejection = KeepsakeError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers).ok_or_else(|| {
            KeepsakeError::Unauthorized(format!("missing {OWNER_HEADER} header"))
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn blank_or_missing_header_is_no_identity() {
        let mut headers = HeaderMap::new();
        assert!(OwnerIdentity::from_headers(&headers).is_none());

        headers.insert(OWNER_HEADER, HeaderValue::from_static("   "));
        assert!(OwnerIdentity::from_headers(&headers).is_none());
    }

    #[test]
    fn header_value_is_trimmed() {
        let mut headers = HeaderMap::new();
        headers.insert(OWNER_HEADER, HeaderValue::from_static(" owner-7 "));
        assert_eq!(
            OwnerIdentity::from_headers(&headers),
            Some(OwnerIdentity(OwnerId::new("owner-7")))
        );
    }
}
