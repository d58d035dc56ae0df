use super::*;
use crate::auth::{StaticTokens, TokenVerifier};
use crate::routes;
use crate::state::test_helpers::{seed_client, test_app_state};
use async_trait::async_trait;
use client::{ConnectionState, PresenceEvent, ScrollMetrics, SyncConfig, ViewHandle, ViewSession, WsConnector};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Duration, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite;

const SCROLL: &str = r#"{"type":"scroll_position_update","scroll_position":{"scrollTop":500,"scrollHeight":2000,"clientHeight":800,"scrollPercentage":25}}"#;

fn ada() -> Identity {
    Identity { user_id: 1, username: "ada".into() }
}

async fn recv_relayed(rx: &mut mpsc::Receiver<ServerFrame>) -> ServerFrame {
    timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("relay receive timed out")
        .expect("relay channel closed unexpectedly")
}

#[tokio::test]
async fn scroll_update_is_relayed_to_peers_as_user_scroll() {
    let state = test_app_state();
    let (sender, mut sender_rx) = seed_client(&state, 5, 1, "ada").await;
    let (_peer, mut peer_rx) = seed_client(&state, 5, 2, "grace").await;

    assert_eq!(process_inbound_text(&state, 5, sender, &ada(), SCROLL).await, Some(1));

    let ServerFrame::UserScrollPosition { user_id, username, scroll_position, .. } = recv_relayed(&mut peer_rx).await;
    assert_eq!(user_id, 1);
    assert_eq!(username, "ada");
    assert!((scroll_position.scroll_percentage - 25.0).abs() < f64::EPSILON);
    assert!(sender_rx.try_recv().is_err(), "sender never hears its own update");
}

#[tokio::test]
async fn identity_comes_from_token_not_payload() {
    let state = test_app_state();
    let (sender, _rx) = seed_client(&state, 5, 1, "ada").await;
    let (_peer, mut peer_rx) = seed_client(&state, 5, 2, "grace").await;
    let spoofed = SCROLL.replacen('{', r#"{"user_id":999,"username":"mallory","#, 1);

    process_inbound_text(&state, 5, sender, &ada(), &spoofed).await;

    let ServerFrame::UserScrollPosition { user_id, username, .. } = recv_relayed(&mut peer_rx).await;
    assert_eq!((user_id, username.as_str()), (1, "ada"));
}

#[tokio::test]
async fn viewport_fields_are_forwarded() {
    let state = test_app_state();
    let (sender, _rx) = seed_client(&state, 5, 1, "ada").await;
    let (_peer, mut peer_rx) = seed_client(&state, 5, 2, "grace").await;
    let with_viewport = SCROLL.replacen('{', r#"{"current_message_index":3,"current_message_id":"m3","#, 1);

    process_inbound_text(&state, 5, sender, &ada(), &with_viewport).await;

    let ServerFrame::UserScrollPosition { current_message_index, current_message_id, .. } =
        recv_relayed(&mut peer_rx).await;
    assert_eq!(current_message_index, Some(3));
    assert_eq!(current_message_id.as_deref(), Some("m3"));
}

#[tokio::test]
async fn malformed_and_unknown_frames_are_dropped() {
    let state = test_app_state();
    let (sender, _rx) = seed_client(&state, 5, 1, "ada").await;
    let (_peer, mut peer_rx) = seed_client(&state, 5, 2, "grace").await;

    assert_eq!(process_inbound_text(&state, 5, sender, &ada(), "{not json").await, None);
    assert_eq!(process_inbound_text(&state, 5, sender, &ada(), r#"{"type":"typing"}"#).await, None);
    assert_eq!(process_inbound_text(&state, 5, sender, &ada(), r#"{"scroll_position":{}}"#).await, None);
    assert!(peer_rx.try_recv().is_err());
}

#[tokio::test]
async fn lone_client_relays_to_nobody() {
    let state = test_app_state();
    let (sender, _rx) = seed_client(&state, 5, 1, "ada").await;
    assert_eq!(process_inbound_text(&state, 5, sender, &ada(), SCROLL).await, Some(0));
}

// =============================================================
// live socket
// =============================================================

const WAIT: Duration = Duration::from_secs(5);

/// Verifier whose backend is always down.
struct UnavailableVerifier;

#[async_trait]
impl TokenVerifier for UnavailableVerifier {
    async fn verify(&self, _token: &str) -> Result<Identity, AuthError> {
        Err(AuthError::Backend("token store offline".into()))
    }
}

async fn serve(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, routes::app(state)).await.expect("relay serve");
    });
    format!("http://{addr}")
}

async fn spawn_relay() -> String {
    let tokens = StaticTokens::default()
        .with_token("alpha", 1, "ada")
        .with_token("beta", 2, "grace")
        .with_token("to+k&en=#1", 3, "hopper");
    serve(AppState::new(Arc::new(tokens), 16)).await
}

fn open_view(base_url: &str, conversation_id: i64, token: &str) -> ViewHandle {
    let config = SyncConfig::default().with_base_url(base_url);
    ViewSession::spawn(config, Arc::new(WsConnector), Some(conversation_id), Some(token.to_owned()))
}

async fn wait_open(view: &ViewHandle) {
    let mut rx = view.watch_connection();
    timeout(WAIT, rx.wait_for(|s| *s == ConnectionState::Open))
        .await
        .expect("view did not open")
        .expect("view dropped");
}

fn ws_url(base_url: &str, path: &str) -> String {
    format!("{}{path}", base_url.replacen("http://", "ws://", 1))
}

async fn rejected_status(base_url: &str, path: &str) -> u16 {
    let err = connect_async(ws_url(base_url, path)).await.expect_err("must be rejected");
    let tungstenite::Error::Http(response) = err else {
        panic!("expected http rejection for {path}, got {err:?}");
    };
    response.status().as_u16()
}

#[tokio::test]
async fn live_scroll_in_one_view_reaches_the_other() {
    let base = spawn_relay().await;
    let a = open_view(&base, 9, "alpha");
    let b = open_view(&base, 9, "beta");
    wait_open(&a).await;
    wait_open(&b).await;
    let mut b_events = b.subscribe_presence();

    a.handle_scroll(ScrollMetrics { scroll_top: 500.0, scroll_height: 2000.0, client_height: 800.0 });

    let event = timeout(WAIT, b_events.recv()).await.expect("no presence update").expect("event");
    let PresenceEvent::Updated(user) = event else {
        panic!("expected update, got {event:?}");
    };
    assert_eq!(user.user_id, 1);
    assert_eq!(user.username, "ada");
    assert!((user.scroll_position.scroll_percentage - 25.0).abs() < f64::EPSILON);
    assert_eq!(b.present_users().len(), 1);
    assert!(a.present_users().is_empty(), "sender is excluded from its own relay");

    a.close().await;
    b.close().await;
}

#[tokio::test]
async fn live_other_conversations_do_not_see_updates() {
    let base = spawn_relay().await;
    let a = open_view(&base, 1, "alpha");
    let b = open_view(&base, 2, "beta");
    wait_open(&a).await;
    wait_open(&b).await;
    let mut b_events = b.subscribe_presence();

    a.handle_scroll(ScrollMetrics { scroll_top: 10.0, scroll_height: 100.0, client_height: 50.0 });

    assert!(timeout(Duration::from_millis(400), b_events.recv()).await.is_err());
}

#[tokio::test]
async fn live_token_with_reserved_characters_authenticates() {
    let base = spawn_relay().await;
    let a = open_view(&base, 4, "to+k&en=#1");
    let b = open_view(&base, 4, "beta");
    wait_open(&a).await;
    wait_open(&b).await;
    let mut b_events = b.subscribe_presence();

    a.handle_scroll(ScrollMetrics { scroll_top: 10.0, scroll_height: 100.0, client_height: 50.0 });

    let event = timeout(WAIT, b_events.recv()).await.expect("no presence update").expect("event");
    assert!(matches!(event, PresenceEvent::Updated(ref u) if u.user_id == 3 && u.username == "hopper"));
}

#[tokio::test]
async fn live_unknown_or_missing_token_is_unauthorized() {
    let base = spawn_relay().await;
    assert_eq!(rejected_status(&base, "/api/ws/conversations/1?token=nope").await, 401);
    assert_eq!(rejected_status(&base, "/api/ws/conversations/1").await, 401);
}

#[tokio::test]
async fn live_verifier_backend_failure_is_server_error() {
    let base = serve(AppState::new(Arc::new(UnavailableVerifier), 16)).await;
    assert_eq!(rejected_status(&base, "/api/ws/conversations/1?token=alpha").await, 500);
    assert_eq!(rejected_status(&base, "/api/ws/conversations/1").await, 401);
}

#[tokio::test]
async fn live_malformed_frame_does_not_close_socket() {
    let base = spawn_relay().await;
    let (mut sender, _) = connect_async(ws_url(&base, "/api/ws/conversations/3?token=alpha")).await.expect("alpha");
    let (mut receiver, _) = connect_async(ws_url(&base, "/api/ws/conversations/3?token=beta")).await.expect("beta");
    tokio::time::sleep(Duration::from_millis(100)).await;

    sender.send(tungstenite::Message::text("{not json")).await.expect("send malformed");
    sender.send(tungstenite::Message::text(r#"{"type":"typing_indicator"}"#)).await.expect("send unknown");
    sender.send(tungstenite::Message::text(SCROLL)).await.expect("send valid");

    let msg = timeout(WAIT, receiver.next()).await.expect("no relay").expect("stream open").expect("message");
    let tungstenite::Message::Text(text) = msg else {
        panic!("expected text frame, got {msg:?}");
    };
    let value: serde_json::Value = serde_json::from_str(text.as_str()).expect("json");
    assert_eq!(value["type"], "user_scroll_position");
    assert_eq!(value["user_id"], 1);
    assert_eq!(value["username"], "ada");
}

#[tokio::test]
async fn live_healthz_answers_ok() {
    let base = spawn_relay().await;
    let addr = base.trim_start_matches("http://");
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream
        .write_all(b"GET /healthz HTTP/1.1\r\nHost: relay\r\nConnection: close\r\n\r\n")
        .await
        .expect("write request");

    let mut response = String::new();
    stream.read_to_string(&mut response).await.expect("read response");
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.ends_with("ok"), "{response}");
}
