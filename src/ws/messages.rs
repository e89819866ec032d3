//! WebSocket message types: envelope, commands, and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::dto::{PageDto, PublicPageDto};
use crate::narrative::{RevealState, ViewportSample};
use crate::sync::{PageSnapshot, TimelineSnapshot, WriteFailure};

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

impl WsMessage {
    /// Builds a server message stamped with the current time.
    #[must_use]
    pub fn new(id: impl Into<String>, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds an event with a fresh server-generated ID.
    #[must_use]
    pub fn event(event: &WsEvent) -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            WsMessageType::Event,
            serde_json::to_value(event).unwrap_or_default(),
        )
    }

    /// Builds an error reply to the message with `id`.
    #[must_use]
    pub fn error(id: impl Into<String>, code: u32, message: impl Into<String>) -> Self {
        Self::new(
            id,
            WsMessageType::Error,
            serde_json::json!({ "code": code, "message": message.into() }),
        )
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client pushed event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands that a client can send over WebSocket.
///
/// Carried in the payload of a `command` envelope, e.g.
/// `{"command": "subscribe_code", "code": "AB3DEFGH9K"}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Live preview of an owned page. Requires the owner header on the
    /// upgrade request.
    SubscribePage {
        /// Page to follow.
        page_id: uuid::Uuid,
    },
    /// Public viewer: follow the page an access code resolves to.
    SubscribeCode {
        /// Access code.
        code: String,
    },
    /// Stop following the current page.
    Unsubscribe,
    /// Viewport geometry from the latest scroll or resize.
    ScrollSample {
        /// Geometry sample.
        sample: ViewportSample,
    },
    /// Visibility reading for one card.
    Intersect {
        /// Card reveal key from the render plan.
        key: String,
        /// Visible fraction of the card in `[0, 1]`.
        visible_ratio: f64,
    },
    /// Re-arm every node, e.g. after "replay".
    ResetReveal,
}

/// Page state as sent over the socket.
///
/// Owners get the full page; public viewers get the fields a code holder
/// may see.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PageView {
    /// The page exists.
    Present {
        /// Page body.
        page: PageBody,
        /// `true` while a local write to the page is unconfirmed.
        has_pending_writes: bool,
    },
    /// The page was deleted. No further page events follow.
    Deleted {
        /// The deleted page.
        page_id: uuid::Uuid,
    },
}

/// Page body, shaped by who is looking.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PageBody {
    /// Owner live preview.
    Owner(PageDto),
    /// Public viewer.
    Public(PublicPageDto),
}

impl PageView {
    /// Shapes `snapshot` for an owner (`owner_view`) or a public viewer.
    #[must_use]
    pub fn from_snapshot(snapshot: &PageSnapshot, owner_view: bool) -> Self {
        match snapshot {
            PageSnapshot::Present {
                page,
                has_pending_writes,
            } => Self::Present {
                page: if owner_view {
                    PageBody::Owner(PageDto::from(page))
                } else {
                    PageBody::Public(PublicPageDto::from(page))
                },
                has_pending_writes: *has_pending_writes,
            },
            PageSnapshot::Deleted { page_id } => Self::Deleted {
                page_id: *page_id.as_uuid(),
            },
        }
    }
}

/// Events pushed to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WsEvent {
    /// Current state of the followed page.
    PageSnapshot {
        /// Page state.
        snapshot: PageView,
    },
    /// Current ordered events of the followed page.
    TimelineSnapshot {
        /// Timeline state.
        snapshot: TimelineSnapshot,
    },
    /// Reveal state after a frame, an intersection reading or a reset.
    RevealState {
        /// Reveal state.
        state: RevealState,
    },
    /// One of the connection owner's writes failed and was rolled back.
    WriteFailed {
        /// Failure notice.
        failure: WriteFailure,
    },
}
