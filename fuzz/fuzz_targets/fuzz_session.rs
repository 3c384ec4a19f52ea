#![no_main]

//! Feeds one inbound event per input line to a session whose `join` was just
//! emitted (the input supplies `onJoin` itself, in any position) and checks
//! that no sequence can show a role outside a joined round or tear down twice.

use libfuzzer_sys::fuzz_target;
use spyword_client::protocol::{Ack, ServerEvent};
use spyword_client::{Effect, Input, RoomId, RoomPhase, RoomSession, RoomStatus};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut session = RoomSession::new(RoomId::parse("FUZZ").unwrap());
    session.apply(Input::RoomStatus(RoomStatus::present(RoomPhase::Waiting)));

    let mut teardowns = 0;
    for line in text.lines() {
        let input = match line {
            "leave" => Input::Leave,
            "drop" => Input::Disconnected,
            "join" => Input::Server(ServerEvent::OnJoin(Ack::new(200, "ok"))),
            "reveal" => {
                session.reveal_role();
                continue;
            }
            _ => match serde_json::from_str::<ServerEvent>(line) {
                Ok(event) => Input::Server(event),
                Err(_) => continue,
            },
        };
        teardowns += session
            .apply(input)
            .iter()
            .filter(|effect| matches!(effect, Effect::Teardown(_)))
            .count();

        assert!(teardowns <= 1);
        if session.role().is_assigned() {
            assert_eq!(session.phase(), RoomPhase::Playing);
            assert!(session.is_active());
        }
        if session.is_revealed() {
            assert!(session.role().is_assigned());
        }
    }
});
