//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection: commands
//! from the client, snapshots from the followed page, write failures for
//! the connection's owner and the frame clock that drives the reveal
//! session.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use super::messages::{PageView, WsCommand, WsEvent, WsMessage, WsMessageType};
use super::subscription::{FollowMode, Followed, SubscriptionManager, next_or_pending};
use crate::app_state::AppState;
use crate::domain::{OwnerId, Page, PageId};
use crate::error::KeepsakeError;
use crate::narrative::{RevealState, ViewerSession};
use crate::sync::{PageSnapshot, TimelineSnapshot, WriteFailure};

/// One animation frame. Scroll samples arriving faster are coalesced.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Runs the read/write loop for a single WebSocket connection.
///
/// `owner` is the identity from the upgrade request. Without one the
/// connection can only follow pages by access code.
pub async fn run_connection(socket: WebSocket, state: AppState, owner: Option<OwnerId>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();
    let mut errors = owner
        .as_ref()
        .map(|_| state.page_service.sync().write_errors());
    let mut frames = tokio::time::interval(FRAME_INTERVAL);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    'conn: loop {
        let (page_stream, timeline_stream) = subs.streams();
        let outgoing: Vec<WsMessage> = tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    handle_text_message(&text, &state, owner.as_ref(), &mut subs).await
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(err)) => {
                    tracing::debug!(error = %err, "ws read failed");
                    break;
                }
                _ => Vec::new(),
            },
            snapshot = next_or_pending(page_stream) => on_page_snapshot(snapshot, &mut subs),
            snapshot = next_or_pending(timeline_stream) => on_timeline_snapshot(snapshot, &mut subs),
            failure = recv_or_pending(errors.as_mut()) => match failure {
                Ok(failure) if owner.as_ref() == Some(&failure.actor) => {
                    vec![WsMessage::event(&WsEvent::WriteFailed { failure })]
                }
                Ok(_) => Vec::new(),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "ws client lagged behind write-error bus");
                    Vec::new()
                }
                Err(broadcast::error::RecvError::Closed) => {
                    errors = None;
                    Vec::new()
                }
            },
            _ = frames.tick() => subs
                .session_mut()
                .and_then(ViewerSession::on_frame)
                .map(reveal_event)
                .into_iter()
                .collect(),
        };

        for msg in outgoing {
            let Ok(json) = serde_json::to_string(&msg) else {
                continue;
            };
            if ws_tx.send(Message::text(json)).await.is_err() {
                break 'conn;
            }
        }
    }

    if let Some(page_id) = subs.unfollow() {
        tracing::debug!(%page_id, "dropping page subscription with connection");
    }
    tracing::debug!("ws connection closed");
}

async fn recv_or_pending(
    rx: Option<&mut broadcast::Receiver<WriteFailure>>,
) -> Result<WriteFailure, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn reveal_event(state: RevealState) -> WsMessage {
    WsMessage::event(&WsEvent::RevealState { state })
}

fn on_page_snapshot(snapshot: Option<PageSnapshot>, subs: &mut SubscriptionManager) -> Vec<WsMessage> {
    let Some(snapshot) = snapshot else {
        subs.unfollow();
        return Vec::new();
    };
    let mut out = vec![WsMessage::event(&WsEvent::PageSnapshot {
        snapshot: PageView::from_snapshot(&snapshot, subs.is_owner_view()),
    })];
    match &snapshot {
        PageSnapshot::Present { page, .. } => {
            if let Some(session) = subs.session_mut()
                && session.set_layout(page.layout)
            {
                out.push(reveal_event(session.state()));
            }
        }
        PageSnapshot::Deleted { page_id } => {
            tracing::debug!(%page_id, "followed page deleted");
            subs.unfollow();
        }
    }
    out
}

fn on_timeline_snapshot(
    snapshot: Option<TimelineSnapshot>,
    subs: &mut SubscriptionManager,
) -> Vec<WsMessage> {
    let Some(snapshot) = snapshot else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(2);
    if let Some(session) = subs.session_mut()
        && session.apply_timeline(&snapshot.events)
    {
        out.push(reveal_event(session.state()));
    }
    out.insert(0, WsMessage::event(&WsEvent::TimelineSnapshot { snapshot }));
    out
}

/// Handles a text message from the client, returning the messages to send.
async fn handle_text_message(
    text: &str,
    state: &AppState,
    owner: Option<&OwnerId>,
    subs: &mut SubscriptionManager,
) -> Vec<WsMessage> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return vec![WsMessage::error("", 400, "malformed JSON")];
    };
    let command = match serde_json::from_value::<WsCommand>(msg.payload) {
        Ok(command) => command,
        Err(err) => return vec![WsMessage::error(msg.id, 404, format!("unknown command: {err}"))],
    };

    match command {
        WsCommand::SubscribePage { page_id } => {
            let Some(owner) = owner else {
                let err =
                    KeepsakeError::Unauthorized("subscribe_page requires an owner identity".into());
                return vec![error_reply(msg.id, &err)];
            };
            let page = match state
                .page_service
                .owned_page(owner, PageId::from_uuid(page_id))
                .await
            {
                Ok(page) => page,
                Err(err) => return vec![error_reply(msg.id, &err)],
            };
            follow(msg.id, state, &page, FollowMode::Owner, subs).await
        }
        WsCommand::SubscribeCode { code } => {
            match state.page_service.view_by_code(&code).await {
                Ok(view) => follow(msg.id, state, &view.page, FollowMode::Viewer, subs).await,
                Err(err) => vec![error_reply(msg.id, &err)],
            }
        }
        WsCommand::Unsubscribe => {
            let dropped = subs.unfollow();
            vec![WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({ "unsubscribed": dropped.map(|id| id.to_string()) }),
            )]
        }
        WsCommand::ScrollSample { sample } => match subs.session_mut() {
            Some(session) => {
                session.notify_scroll(sample);
                Vec::new()
            }
            None => vec![not_following(msg.id)],
        },
        WsCommand::Intersect { key, visible_ratio } => match subs.session_mut() {
            Some(session) => session
                .intersect(&key, visible_ratio)
                .map(reveal_event)
                .into_iter()
                .collect(),
            None => vec![not_following(msg.id)],
        },
        WsCommand::ResetReveal => match subs.session_mut() {
            Some(session) => vec![reveal_event(session.reset())],
            None => vec![not_following(msg.id)],
        },
    }
}

/// Opens both streams for `page` and replaces whatever was followed.
async fn follow(
    id: String,
    state: &AppState,
    page: &Page,
    mode: FollowMode,
    subs: &mut SubscriptionManager,
) -> Vec<WsMessage> {
    let sync = state.page_service.sync();
    let opened = async {
        let page_sub = sync.subscribe_page(page.id).await?;
        let timeline_sub = sync.subscribe_timeline(page.id).await?;
        Ok::<_, KeepsakeError>((page_sub, timeline_sub))
    }
    .await;
    let (page_sub, timeline_sub) = match opened {
        Ok(streams) => streams,
        Err(KeepsakeError::PageNotFound(_)) if mode == FollowMode::Viewer => {
            return vec![error_reply(id, &KeepsakeError::CodeNotFound)];
        }
        Err(err) => return vec![error_reply(id, &err)],
    };

    let session = ViewerSession::new(
        page.id,
        page.layout,
        state.narrative.engine,
        state.narrative.policy,
    );
    if let Some(previous) = subs.follow(Followed {
        mode,
        page: page_sub,
        timeline: timeline_sub,
        session,
    }) {
        tracing::debug!(page_id = %previous, "replaced page subscription");
    }
    tracing::debug!(page_id = %page.id, ?mode, "ws following page");

    vec![WsMessage::new(
        id,
        WsMessageType::Response,
        serde_json::json!({
            "subscribed": page.id.to_string(),
            "mode": match mode {
                FollowMode::Owner => "owner",
                FollowMode::Viewer => "viewer",
            },
        }),
    )]
}

fn error_reply(id: String, err: &KeepsakeError) -> WsMessage {
    WsMessage::error(id, err.error_code(), err.to_string())
}

fn not_following(id: String) -> WsMessage {
    error_reply(
        id,
        &KeepsakeError::InvalidRequest("no page is being followed".into()),
    )
}
