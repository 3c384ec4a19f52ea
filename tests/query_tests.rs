#![cfg(feature = "query-http")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! `HttpRoomQuery` against a one-shot local HTTP authority.
//!
//! Each test binds a `TcpListener` on an ephemeral port, answers exactly one
//! request with a canned status and body, and hands back what the client
//! sent.

use std::time::Duration;

use serde_json::{json, Value};
use spyword_client::{
    ConnectionId, HttpRoomQuery, RoomId, RoomPhase, RoomQuery, RoomStatus, SpyWordError, Status,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// What the authority saw.
struct Request {
    line: String,
    body: Value,
}

/// Serve one request, replying with `status` and `body` after `delay`.
async fn one_shot(status: u16, body: &str, delay: Duration) -> (String, JoinHandle<Request>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let body = body.to_string();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        let (head_end, content_length) = loop {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "client hung up before sending headers");
            raw.extend_from_slice(&buf[..n]);
            if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&raw[..pos]).to_ascii_lowercase();
                let length = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .map_or(0, |v| v.trim().parse::<usize>().unwrap());
                break (pos + 4, length);
            }
        };
        while raw.len() < head_end + content_length {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "client hung up before sending the body");
            raw.extend_from_slice(&buf[..n]);
        }

        let line = String::from_utf8_lossy(&raw[..head_end])
            .lines()
            .next()
            .unwrap_or_default()
            .to_string();
        let request_body = serde_json::from_slice(&raw[head_end..head_end + content_length])
            .unwrap_or(Value::Null);

        tokio::time::sleep(delay).await;
        let response = format!(
            "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        // The client may have given up already.
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;

        Request {
            line,
            body: request_body,
        }
    });
    (base, handle)
}

fn query(base: &str) -> HttpRoomQuery {
    let http = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    HttpRoomQuery::with_client(http, base)
}

fn room() -> RoomId {
    RoomId::parse("ABC123").unwrap()
}

fn client_id() -> ConnectionId {
    ConnectionId::new("conn-1")
}

// ════════════════════════════════════════════════════════════════════
// Room status
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn game_status_maps_phase_and_sends_ids() {
    let (base, server) = one_shot(200, r#"{"resData":{"gameStatus":1}}"#, Duration::ZERO).await;

    let status = query(&base)
        .query_room_status(&room(), &client_id())
        .await
        .unwrap();
    assert_eq!(status, RoomStatus::present(RoomPhase::Playing));

    let request = server.await.unwrap();
    assert_eq!(request.line, "POST /gameHost/gameStatus HTTP/1.1");
    assert_eq!(
        request.body,
        json!({ "roomId": "ABC123", "clientId": "conn-1" })
    );
}

#[tokio::test]
async fn game_status_zero_is_waiting() {
    let (base, _server) = one_shot(200, r#"{"resData":{"gameStatus":0}}"#, Duration::ZERO).await;
    let status = query(&base)
        .query_room_status(&room(), &client_id())
        .await
        .unwrap();
    assert_eq!(status, RoomStatus::present(RoomPhase::Waiting));
}

#[tokio::test]
async fn game_status_404_means_absent() {
    let (base, _server) = one_shot(404, r#"{"message":"not found"}"#, Duration::ZERO).await;
    let status = query(&base)
        .query_room_status(&room(), &client_id())
        .await
        .unwrap();
    assert!(!status.exists);
}

#[tokio::test]
async fn server_error_is_a_transport_failure_not_absence() {
    let (base, _server) = one_shot(500, "{}", Duration::ZERO).await;
    let err = query(&base)
        .query_room_status(&room(), &client_id())
        .await
        .unwrap_err();
    assert!(
        matches!(err, SpyWordError::QueryStatus { status } if status == Status(500)),
        "{err:?}"
    );
    assert!(err.is_transport());
    assert!(!err.is_room_absent());
}

#[tokio::test]
async fn malformed_body_is_a_transport_failure() {
    let (base, _server) = one_shot(200, r#"{"resData":{}}"#, Duration::ZERO).await;
    let err = query(&base)
        .query_room_status(&room(), &client_id())
        .await
        .unwrap_err();
    assert!(matches!(err, SpyWordError::QueryTransport(_)), "{err:?}");
}

#[tokio::test]
async fn slow_authority_times_out() {
    let (base, _server) = one_shot(
        200,
        r#"{"resData":{"gameStatus":0}}"#,
        Duration::from_secs(2),
    )
    .await;
    let err = query(&base)
        .query_room_status(&room(), &client_id())
        .await
        .unwrap_err();
    assert!(matches!(err, SpyWordError::Timeout), "{err:?}");
}

// ════════════════════════════════════════════════════════════════════
// Host status
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn check_my_room_reports_host() {
    let (base, server) = one_shot(200, r#"{"resData":{"isHost":true}}"#, Duration::ZERO).await;

    let host = query(&base)
        .query_host_status(&room(), &client_id())
        .await
        .unwrap();
    assert!(host.is_host);

    let request = server.await.unwrap();
    assert_eq!(request.line, "POST /gameHost/checkMyRoom HTTP/1.1");
    assert_eq!(request.body["clientId"], "conn-1");
}

#[tokio::test]
async fn check_my_room_404_means_room_gone() {
    let (base, _server) = one_shot(404, "{}", Duration::ZERO).await;
    let err = query(&base)
        .query_host_status(&room(), &client_id())
        .await
        .unwrap_err();
    assert!(err.is_room_absent(), "{err:?}");
}
