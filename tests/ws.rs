//! WebSocket protocol tests over a real socket.

#![allow(clippy::panic, clippy::indexing_slicing)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use keepsake_gateway::api;
use keepsake_gateway::app_state::AppState;
use keepsake_gateway::config::GatewayConfig;
use keepsake_gateway::domain::{EventPatch, NewPage, OwnerId, PagePatch};
use keepsake_gateway::store::MemoryStore;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve() -> (SocketAddr, AppState) {
    let Ok(state) = AppState::new(&GatewayConfig::default(), Arc::new(MemoryStore::new(256)))
    else {
        panic!("state should build");
    };
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind should succeed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("listener has an address");
    };
    let app = api::build_app(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, state)
}

async fn connect(addr: SocketAddr, owner: Option<&'static str>) -> Socket {
    let Ok(mut request) = format!("ws://{addr}/ws").into_client_request() else {
        panic!("valid ws url");
    };
    if let Some(owner) = owner {
        request
            .headers_mut()
            .insert("x-owner-id", HeaderValue::from_static(owner));
    }
    let Ok((socket, _)) = tokio_tungstenite::connect_async(request).await else {
        panic!("ws handshake should succeed");
    };
    socket
}

async fn command(socket: &mut Socket, id: &str, payload: Value) {
    let envelope = json!({
        "id": id,
        "type": "command",
        "timestamp": chrono::Utc::now(),
        "payload": payload,
    });
    let Ok(()) = socket.send(Message::text(envelope.to_string())).await else {
        panic!("send should succeed");
    };
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let Ok(Some(Ok(msg))) = tokio::time::timeout(Duration::from_secs(3), socket.next()).await
        else {
            panic!("expected a message from the server");
        };
        if let Message::Text(text) = msg {
            let Ok(value) = serde_json::from_str(text.as_str()) else {
                panic!("server sent invalid JSON");
            };
            return value;
        }
    }
}

/// Reads until a message satisfies `pred`.
async fn wait_for(socket: &mut Socket, pred: impl Fn(&Value) -> bool) -> Value {
    loop {
        let msg = next_json(socket).await;
        if pred(&msg) {
            return msg;
        }
    }
}

fn is_event(msg: &Value, name: &str) -> bool {
    msg["type"] == "event" && msg["payload"]["event"] == name
}

#[tokio::test]
async fn viewer_follows_by_code_and_connects_at_full_scroll() {
    let (addr, state) = serve().await;
    let owner = OwnerId::new("alice");
    let Ok(created) = state
        .page_service
        .create_page(&owner, NewPage::default())
        .await
    else {
        panic!("page should be created");
    };
    let page_id = created.page.id;
    for date in ["2021-06-01", "2021-01-01"] {
        let Ok((event_id, _)) = state.page_service.add_event(&owner, page_id).await else {
            panic!("event should be added");
        };
        state
            .page_service
            .update_event(&owner, page_id, event_id, EventPatch::Date(Some(date.into())))
            .await;
    }
    state.page_service.sync().flush().await;

    let mut socket = connect(addr, None).await;
    command(
        &mut socket,
        "sub-1",
        json!({ "command": "subscribe_code", "code": created.page.access_code.as_str() }),
    )
    .await;

    let response = wait_for(&mut socket, |m| m["type"] == "response").await;
    assert_eq!(response["id"], "sub-1");
    assert_eq!(response["payload"]["mode"], "viewer");

    // Both streams start with the current state, in either order.
    let (mut page, mut timeline) = (None, None);
    while page.is_none() || timeline.is_none() {
        let msg = next_json(&mut socket).await;
        if is_event(&msg, "page_snapshot") {
            page = Some(msg);
        } else if is_event(&msg, "timeline_snapshot") {
            timeline = Some(msg);
        }
    }
    let (Some(page), Some(timeline)) = (page, timeline) else {
        panic!("both snapshots were seen");
    };
    assert_eq!(page["payload"]["snapshot"]["state"], "present");
    assert!(page["payload"]["snapshot"]["page"].get("owner").is_none());
    assert_eq!(timeline["payload"]["snapshot"]["events"][0]["date"], "2021-01-01");

    command(
        &mut socket,
        "scroll-1",
        json!({
            "command": "scroll_sample",
            "sample": {
                "viewport_height": 800.0,
                "start_anchor_top": -1000.0,
                "end_anchor": { "top": 0.0, "height": 0.0 }
            }
        }),
    )
    .await;
    let reveal = wait_for(&mut socket, |m| {
        is_event(m, "reveal_state") && m["payload"]["state"]["fully_connected"] == true
    })
    .await;
    assert_eq!(reveal["payload"]["state"]["progress"], 100.0);
    assert_eq!(reveal["payload"]["state"]["nodes"], json!(["revealed", "revealed"]));
}

#[tokio::test]
async fn owner_connection_receives_its_own_write_failures() {
    let (addr, state) = serve().await;
    let alice = OwnerId::new("alice");
    let Ok(created) = state
        .page_service
        .create_page(&alice, NewPage::default())
        .await
    else {
        panic!("page should be created");
    };
    state.page_service.sync().flush().await;

    let mut socket = connect(addr, Some("mallory")).await;
    command(&mut socket, "ready", json!({ "command": "unsubscribe" })).await;
    let ready = wait_for(&mut socket, |m| m["type"] == "response").await;
    assert_eq!(ready["id"], "ready");

    let mallory = OwnerId::new("mallory");
    let ticket = state
        .page_service
        .update_page(&mallory, created.page.id, PagePatch::Title("Mine".into()))
        .await;

    let failed = wait_for(&mut socket, |m| is_event(m, "write_failed")).await;
    assert_eq!(failed["payload"]["failure"]["reason"], "permission_denied");
    assert_eq!(failed["payload"]["failure"]["seq"], ticket.seq);
}

#[tokio::test]
async fn subscribe_page_requires_the_owner() {
    let (addr, state) = serve().await;
    let alice = OwnerId::new("alice");
    let Ok(created) = state
        .page_service
        .create_page(&alice, NewPage::default())
        .await
    else {
        panic!("page should be created");
    };
    state.page_service.sync().flush().await;
    let page_id = created.page.id.to_string();

    let mut anonymous = connect(addr, None).await;
    command(
        &mut anonymous,
        "p-1",
        json!({ "command": "subscribe_page", "page_id": page_id }),
    )
    .await;
    let denied = wait_for(&mut anonymous, |m| m["type"] == "error").await;
    assert_eq!(denied["payload"]["code"], 2101);

    let mut intruder = connect(addr, Some("mallory")).await;
    command(
        &mut intruder,
        "p-2",
        json!({ "command": "subscribe_page", "page_id": page_id }),
    )
    .await;
    let denied = wait_for(&mut intruder, |m| m["type"] == "error").await;
    assert_eq!(denied["id"], "p-2");
    assert_eq!(denied["payload"]["code"], 2101);

    let mut owner = connect(addr, Some("alice")).await;
    command(
        &mut owner,
        "p-3",
        json!({ "command": "subscribe_page", "page_id": page_id }),
    )
    .await;
    let ok = wait_for(&mut owner, |m| m["type"] == "response").await;
    assert_eq!(ok["payload"]["mode"], "owner");
    let snapshot = wait_for(&mut owner, |m| is_event(m, "page_snapshot")).await;
    assert!(snapshot["payload"]["snapshot"]["page"]["access_code"].is_string());
}

#[tokio::test]
async fn reveal_commands_need_a_followed_page() {
    let (addr, _state) = serve().await;
    let mut socket = connect(addr, None).await;
    command(&mut socket, "r-1", json!({ "command": "reset_reveal" })).await;
    let err = wait_for(&mut socket, |m| m["type"] == "error").await;
    assert_eq!(err["id"], "r-1");
    assert_eq!(err["payload"]["code"], 1001);

    command(&mut socket, "r-2", json!({ "command": "play_soundtrack" })).await;
    let err = wait_for(&mut socket, |m| m["type"] == "error").await;
    assert_eq!(err["payload"]["code"], 404);
}
