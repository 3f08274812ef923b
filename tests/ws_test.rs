//! Integration tests for the post-accept WebSocket handshake, the
//! connection registry cap, and end-to-end message fanout.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parley_server::schema::MessageFrame;
use parley_server::state::AppState;
use parley_server::ws::ConnectionRegistry;
use parley_server::{auth, db, routes};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct TestServer {
    base_url: String,
    addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    alice: i64,
    bob: i64,
    charlie: i64,
    general: i64,
    _tmp: tempfile::TempDir,
}

/// Start the server on a random port with three users: alice and bob share
/// the "general" conversation, charlie is in no conversation.
async fn start_test_server(connection_limit: usize, handshake_timeout_ms: u64) -> TestServer {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp.path().to_str().unwrap().to_string();

    let db = db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret =
        auth::jwt::load_or_generate_jwt_secret(&data_dir).expect("Failed to generate JWT secret");

    let (alice, bob, charlie, general) = {
        let conn = db.lock().unwrap();
        let alice = db::users::add_user(
            &conn,
            "alice",
            "alice",
            "alice@example.com",
            &auth::password::hash_password("alicepw").unwrap(),
        )
        .unwrap();
        let bob = db::users::add_user(
            &conn,
            "bob",
            "bob",
            "bob@example.com",
            &auth::password::hash_password("bobpw").unwrap(),
        )
        .unwrap();
        let charlie = db::users::add_user(
            &conn,
            "charlie",
            "charlie",
            "charlie@example.com",
            &auth::password::hash_password("charliepw").unwrap(),
        )
        .unwrap();
        let general =
            db::conversations::create_conversation(&conn, "general", &[alice, bob]).unwrap();
        (alice, bob, charlie, general)
    };

    let registry = Arc::new(ConnectionRegistry::new(connection_limit));
    let state = AppState {
        db,
        jwt_secret,
        token_ttl_secs: 3600,
        registry: registry.clone(),
        handshake_timeout: Duration::from_millis(handshake_timeout_ms),
    };

    let app = routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer {
        base_url: format!("http://{}", addr),
        addr,
        registry,
        alice,
        bob,
        charlie,
        general,
        _tmp: tmp,
    }
}

async fn login(base_url: &str, username: &str, password: &str) -> String {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/token", base_url))
        .form(&[("username", username), ("password", password)])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "login failed for {}", username);
    let body: serde_json::Value = resp.json().await.unwrap();
    body["access_token"].as_str().unwrap().to_string()
}

async fn connect_ws(addr: &SocketAddr) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("Failed to connect to WebSocket");
    stream
}

/// Send the auth frame: `["tag", "Authorization: Bearer <token>"]`.
async fn send_auth_frame(ws: &mut WsStream, token: &str) {
    let frame = json!(["x", format!("Authorization: Bearer {}", token)]).to_string();
    ws.send(Message::Text(frame.into())).await.unwrap();
}

/// Wait until the registry shows `expected` connections for `user_id`.
async fn wait_for_count(registry: &ConnectionRegistry, user_id: i64, expected: usize) {
    for _ in 0..50 {
        if registry.count_for(user_id) == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "registry never reached {} connections for user {} (now {})",
        expected,
        user_id,
        registry.count_for(user_id)
    );
}

/// Read frames until a close or stream end is observed.
async fn expect_closed(ws: &mut WsStream, within: Duration) {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        let remaining = deadline
            .checked_duration_since(tokio::time::Instant::now())
            .unwrap_or(Duration::ZERO);
        match tokio::time::timeout(remaining, ws.next()).await {
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => return,
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(_))) => return, // connection reset counts as closed
            Err(_) => panic!("connection still open after {:?}", within),
        }
    }
}

async fn next_frame(ws: &mut WsStream) -> MessageFrame {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("expected a frame within timeout")
            .expect("stream ended")
            .expect("websocket error");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("valid frame JSON")
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("expected text frame, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn handshake_registers_exactly_one_entry() {
    let server = start_test_server(5, 5000).await;
    let token = login(&server.base_url, "alice", "alicepw").await;

    let mut ws = connect_ws(&server.addr).await;
    send_auth_frame(&mut ws, &token).await;

    wait_for_count(&server.registry, server.alice, 1).await;

    // Closing the socket tears the entry down again.
    ws.send(Message::Close(None)).await.unwrap();
    drop(ws);
    wait_for_count(&server.registry, server.alice, 0).await;
}

#[tokio::test]
async fn silent_connection_is_closed_after_timeout() {
    let server = start_test_server(5, 300).await;

    let mut ws = connect_ws(&server.addr).await;
    // Send nothing: the server must close us shortly after the window.
    expect_closed(&mut ws, Duration::from_secs(2)).await;

    assert_eq!(server.registry.count_for(server.alice), 0);
    assert_eq!(server.registry.count_for(server.bob), 0);
}

#[tokio::test]
async fn malformed_envelope_is_closed_without_detail() {
    let server = start_test_server(5, 5000).await;

    let mut ws = connect_ws(&server.addr).await;
    ws.send(Message::Text("{\"not\": \"an array\"}".into()))
        .await
        .unwrap();

    expect_closed(&mut ws, Duration::from_secs(2)).await;
    assert_eq!(server.registry.count_for(server.alice), 0);
}

#[tokio::test]
async fn invalid_token_is_closed_without_detail() {
    let server = start_test_server(5, 5000).await;

    let mut ws = connect_ws(&server.addr).await;
    send_auth_frame(&mut ws, "not.a.token").await;

    expect_closed(&mut ws, Duration::from_secs(2)).await;
    assert_eq!(server.registry.count_for(server.alice), 0);
}

#[tokio::test]
async fn connection_limit_closes_excess_handshakes() {
    let server = start_test_server(1, 5000).await;
    let token = login(&server.base_url, "alice", "alicepw").await;

    let mut first = connect_ws(&server.addr).await;
    send_auth_frame(&mut first, &token).await;
    wait_for_count(&server.registry, server.alice, 1).await;

    // Second handshake for the same user: closed, indistinguishable from
    // an auth failure, and the first connection is left untouched.
    let mut second = connect_ws(&server.addr).await;
    send_auth_frame(&mut second, &token).await;
    expect_closed(&mut second, Duration::from_secs(2)).await;

    assert_eq!(server.registry.count_for(server.alice), 1);
}

#[tokio::test]
async fn posted_message_reaches_members_and_multi_device_sender() {
    let server = start_test_server(5, 5000).await;
    let alice_token = login(&server.base_url, "alice", "alicepw").await;
    let bob_token = login(&server.base_url, "bob", "bobpw").await;

    // Alice has two devices, bob one.
    let mut alice_a = connect_ws(&server.addr).await;
    send_auth_frame(&mut alice_a, &alice_token).await;
    let mut alice_b = connect_ws(&server.addr).await;
    send_auth_frame(&mut alice_b, &alice_token).await;
    let mut bob_ws = connect_ws(&server.addr).await;
    send_auth_frame(&mut bob_ws, &bob_token).await;

    wait_for_count(&server.registry, server.alice, 2).await;
    wait_for_count(&server.registry, server.bob, 1).await;

    // Alice posts over REST.
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/usermsg", server.base_url))
        .header("Authorization", format!("Bearer {}", alice_token))
        .json(&json!({ "conversation_id": server.general, "content": "hello room" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    // Every member connection observes the frame, including the sender's
    // own second device.
    for ws in [&mut alice_a, &mut alice_b, &mut bob_ws] {
        let frame = next_frame(ws).await;
        assert_eq!(frame.convo_id, server.general);
        assert_eq!(frame.originator, server.alice);
        assert_eq!(frame.content, "hello room");
    }
}

#[tokio::test]
async fn non_member_connection_receives_nothing() {
    let server = start_test_server(5, 5000).await;
    let alice_token = login(&server.base_url, "alice", "alicepw").await;
    let charlie_token = login(&server.base_url, "charlie", "charliepw").await;

    let mut charlie_ws = connect_ws(&server.addr).await;
    send_auth_frame(&mut charlie_ws, &charlie_token).await;
    wait_for_count(&server.registry, server.charlie, 1).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/usermsg", server.base_url))
        .header("Authorization", format!("Bearer {}", alice_token))
        .json(&json!({ "conversation_id": server.general, "content": "members only" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Charlie is not in the conversation: no delivery.
    let result = tokio::time::timeout(Duration::from_millis(500), charlie_ws.next()).await;
    assert!(result.is_err(), "expected no frame for non-member");
}
