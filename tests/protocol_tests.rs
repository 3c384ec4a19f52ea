#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire-format tests for the spy/word protocol.
//!
//! Event names and field names are the authority's contract. These tests pin
//! the exact JSON the client sends and parse the exact JSON the authority
//! pushes.

use serde_json::json;
use spyword_client::protocol::{
    Ack, GameStatusResponse, HostStatusResponse, RolePayload, RoomQueryRequest, WireRole,
};
use spyword_client::status::StatusClass;
use spyword_client::{
    ClientEvent, ConnectionId, EventKind, RoleAssignment, RoomId, RoomPhase, ServerEvent, Status,
};

fn room() -> RoomId {
    RoomId::parse("ABC123").unwrap()
}

fn to_value(event: &ClientEvent) -> serde_json::Value {
    serde_json::to_value(event).expect("client event serialization")
}

// ════════════════════════════════════════════════════════════════════
// Outbound events
// ════════════════════════════════════════════════════════════════════

#[test]
fn room_scoped_events_carry_room_id() {
    let cases = [
        (ClientEvent::Join { room_id: room() }, "join"),
        (ClientEvent::Leave { room_id: room() }, "leave"),
        (ClientEvent::StartGame { room_id: room() }, "startGame"),
        (
            ClientEvent::BackToWaitingRoom { room_id: room() },
            "backToWaitingRoom",
        ),
        (ClientEvent::Ping { room_id: room() }, "ping"),
        (ClientEvent::CheckRoom { room_id: room() }, "checkRoom"),
    ];
    for (event, name) in cases {
        assert_eq!(event.name(), name);
        assert_eq!(
            to_value(&event),
            json!({ "event": name, "data": { "roomId": "ABC123" } })
        );
    }
}

#[test]
fn send_message_carries_the_word() {
    let event = ClientEvent::SendMessage {
        room_id: room(),
        message: "harbor".into(),
    };
    assert_eq!(
        to_value(&event),
        json!({ "event": "sendMessage", "data": { "roomId": "ABC123", "message": "harbor" } })
    );
}

#[test]
fn create_room_has_empty_data() {
    assert_eq!(
        to_value(&ClientEvent::CreateRoom {}),
        json!({ "event": "createRoom", "data": {} })
    );
}

// ════════════════════════════════════════════════════════════════════
// Inbound events
// ════════════════════════════════════════════════════════════════════

#[test]
fn parses_every_inbound_ack_event() {
    for kind in EventKind::ALL {
        if kind == EventKind::OnMessage {
            continue;
        }
        let raw = format!(
            r#"{{"event":"{}","data":{{"status":200,"message":"ok"}}}}"#,
            kind.as_str()
        );
        let event: ServerEvent = serde_json::from_str(&raw).unwrap();
        assert_eq!(event.kind(), kind, "{raw}");
    }
}

#[test]
fn parses_create_room_ack_with_room_id() {
    let raw = r#"{"event":"onCreateRoom","data":{"status":200,"message":"Room created","data":{"roomId":"XY42"}}}"#;
    let event: ServerEvent = serde_json::from_str(raw).unwrap();
    let ServerEvent::OnCreateRoom(ack) = event else {
        panic!("expected onCreateRoom, got {event:?}");
    };
    assert_eq!(ack.status, Status::OK);
    assert_eq!(ack.data.unwrap().room_id.as_str(), "XY42");
}

#[test]
fn ack_without_message_falls_back_to_status_text() {
    let raw = r#"{"event":"onCheckRoom","data":{"status":404}}"#;
    let ServerEvent::OnCheckRoom(ack) = serde_json::from_str::<ServerEvent>(raw).unwrap() else {
        panic!("expected onCheckRoom");
    };
    assert!(ack.message.is_empty());
    assert_eq!(ack.message_or_default(), Status::NOT_FOUND.description());
}

#[test]
fn unknown_fields_are_ignored() {
    let raw = r#"{"event":"onGameStart","data":{"status":200,"message":"go","round":3}}"#;
    let event: ServerEvent = serde_json::from_str(raw).unwrap();
    assert_eq!(event, ServerEvent::OnGameStart(Ack::new(200, "go")));
}

#[test]
fn unknown_event_name_is_rejected() {
    let raw = r#"{"event":"onDance","data":{"status":200}}"#;
    assert!(serde_json::from_str::<ServerEvent>(raw).is_err());
}

#[test]
fn role_payloads_map_to_assignments() {
    let cases = [
        (
            r#"{"role":"player","message":"harbor"}"#,
            RoleAssignment::Player {
                secret_word: "harbor".into(),
            },
        ),
        (r#"{"role":"spy","message":""}"#, RoleAssignment::Spy),
        (r#"{"role":"spy"}"#, RoleAssignment::Spy),
        (r#"{"role":"","message":""}"#, RoleAssignment::Unassigned),
    ];
    for (raw, expected) in cases {
        let payload: RolePayload = serde_json::from_str(raw).unwrap();
        assert_eq!(RoleAssignment::from(payload), expected, "{raw}");
    }
}

#[test]
fn on_message_event_round_trips_the_empty_role() {
    let event = ServerEvent::OnMessage(RolePayload {
        role: WireRole::None,
        message: String::new(),
    });
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(
        value,
        json!({ "event": "onMessage", "data": { "role": "", "message": "" } })
    );
}

// ════════════════════════════════════════════════════════════════════
// Status codes
// ════════════════════════════════════════════════════════════════════

#[test]
fn only_200_and_404_have_meaning() {
    assert_eq!(Status(200).class(), StatusClass::Ok);
    assert_eq!(Status(404).class(), StatusClass::NotFound);
    for code in [201, 400, 403, 409, 429, 500, 503] {
        assert_eq!(Status(code).class(), StatusClass::Failure, "{code}");
        assert!(!Status(code).description().is_empty());
    }
}

// ════════════════════════════════════════════════════════════════════
// Room query bodies
// ════════════════════════════════════════════════════════════════════

#[test]
fn query_request_body_is_camel_case() {
    let body = RoomQueryRequest {
        room_id: room(),
        client_id: ConnectionId::new("conn-1"),
    };
    assert_eq!(
        serde_json::to_value(&body).unwrap(),
        json!({ "roomId": "ABC123", "clientId": "conn-1" })
    );
}

#[test]
fn query_responses_parse() {
    let status: GameStatusResponse =
        serde_json::from_str(r#"{"resData":{"gameStatus":1,"players":4},"ok":true}"#).unwrap();
    assert_eq!(
        RoomPhase::from_game_status(status.res_data.game_status),
        RoomPhase::Playing
    );
    assert_eq!(RoomPhase::from_game_status(0), RoomPhase::Waiting);

    let host: HostStatusResponse =
        serde_json::from_str(r#"{"resData":{"isHost":true}}"#).unwrap();
    assert!(host.res_data.is_host);
}

#[test]
fn room_codes_are_trimmed_and_must_not_be_blank() {
    assert_eq!(RoomId::parse("  ABC123 ").unwrap().as_str(), "ABC123");
    assert!(RoomId::parse("   ").is_err());
    assert!(RoomId::parse("").is_err());
}
