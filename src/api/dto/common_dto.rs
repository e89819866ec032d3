//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::sync::WriteTicket;

/// Response body for every enqueued write (202 Accepted).
///
/// The write has not reached the store. Failures are delivered on the
/// WebSocket `write_failed` event carrying the same `seq`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AcceptedResponse {
    /// Write sequence number.
    pub seq: u64,
    /// Page the write targets.
    pub page_id: uuid::Uuid,
    /// Always `"accepted"`.
    pub status: &'static str,
}

impl From<WriteTicket> for AcceptedResponse {
    fn from(ticket: WriteTicket) -> Self {
        Self {
            seq: ticket.seq,
            page_id: *ticket.page_id.as_uuid(),
            status: "accepted",
        }
    }
}

/// Request body for the single-field `PATCH` endpoints.
///
/// `value` is validated against `field` before anything is enqueued:
/// `{"field": "title", "value": "Ten years"}`. Use `null` to clear an
/// optional field.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FieldPatchRequest {
    /// Field name in snake case.
    pub field: String,
    /// New value.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
}

impl FieldPatchRequest {
    /// Converts the request into a typed patch.
    ///
    /// # Errors
    ///
    /// Returns the deserialization message when the field is unknown or
    /// the value has the wrong shape.
    pub fn into_patch<P>(self) -> Result<P, String>
    where
        P: serde::de::DeserializeOwned,
    {
        let field = self.field;
        serde_json::from_value(serde_json::json!({ "field": field, "value": self.value }))
            .map_err(|e| format!("invalid patch for field `{field}`: {e}"))
    }
}
