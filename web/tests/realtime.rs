//! Realtime channel over a real HTTP transport.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{Router, http::StatusCode, routing::get};
use axum_test::TestServer;
use serde_json::{Value, json};
use standbook_core::{BroadcastEnvelope, PlanId};
use standbook_runtime::Broadcaster;
use standbook_testing::{StaticAuthenticator, fixtures};
use standbook_web::handlers::websocket;
use standbook_web::{RealtimeLimits, RealtimeState};

fn server(broadcaster: Broadcaster, limits: RealtimeLimits) -> TestServer {
    let authenticator = StaticAuthenticator::new()
        .with_user("user-token", "alice", "alice@example.com")
        .into_dyn();
    let app = Router::new()
        .route("/ws", get(websocket::handle))
        .with_state(RealtimeState::new(broadcaster, authenticator, limits));

    TestServer::builder()
        .http_transport()
        .build(app)
        .expect("Failed to start test server")
}

#[tokio::test]
async fn test_anonymous_client_receives_envelopes() {
    let broadcaster = Broadcaster::default();
    let server = server(broadcaster.clone(), RealtimeLimits::default());

    let mut ws = server.get_websocket("/ws").await.into_websocket().await;
    let hello: Value = ws.receive_json().await;
    assert_eq!(hello, json!({"type": "connected", "authenticated": false}));

    let space = fixtures::space(PlanId::new());
    broadcaster.publish(BroadcastEnvelope::space_updated(space.clone()));

    let envelope: Value = ws.receive_json().await;
    assert_eq!(envelope["event"], "space_updated");
    assert_eq!(envelope["space"]["name"], "A-1");
    assert_eq!(envelope["plano_id"], json!(space.plan_id));
}

#[tokio::test]
async fn test_token_query_parameter_authenticates() {
    let server = server(Broadcaster::default(), RealtimeLimits::default());

    let mut ws = server
        .get_websocket("/ws")
        .add_query_param("token", "user-token")
        .await
        .into_websocket()
        .await;

    let hello: Value = ws.receive_json().await;
    assert_eq!(hello, json!({"type": "connected", "authenticated": true}));
}

#[tokio::test]
async fn test_invalid_token_gets_auth_error() {
    let server = server(Broadcaster::default(), RealtimeLimits::default());

    let mut ws = server
        .get_websocket("/ws")
        .add_query_param("token", "forged")
        .await
        .into_websocket()
        .await;

    let error: Value = ws.receive_json().await;
    assert_eq!(error["type"], "auth_error");
}

#[tokio::test]
async fn test_rooms_and_ping() {
    let server = server(Broadcaster::default(), RealtimeLimits::default());
    let mut ws = server.get_websocket("/ws").await.into_websocket().await;
    let _hello: Value = ws.receive_json().await;
    let plano_id = PlanId::new();

    ws.send_json(&json!({"type": "join_plano", "plano_id": plano_id}))
        .await;
    let joined: Value = ws.receive_json().await;
    assert_eq!(joined, json!({"type": "joined_plano", "plano_id": plano_id}));

    ws.send_json(&json!({"type": "leave_plano", "plano_id": plano_id}))
        .await;
    let left: Value = ws.receive_json().await;
    assert_eq!(left["type"], "left_plano");

    ws.send_json(&json!({"type": "ping"})).await;
    let pong: Value = ws.receive_json().await;
    assert_eq!(pong, json!({"type": "pong"}));

    ws.send_text("not json").await;
    let error: Value = ws.receive_json().await;
    assert_eq!(error["type"], "error");
}

#[tokio::test]
async fn test_connection_limit() {
    let server = server(
        Broadcaster::default(),
        RealtimeLimits {
            max_connections: 1,
            ..RealtimeLimits::default()
        },
    );

    let mut first = server.get_websocket("/ws").await.into_websocket().await;
    let _hello: Value = first.receive_json().await;

    server
        .get_websocket("/ws")
        .expect_failure()
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}
