#![no_main]

use libfuzzer_sys::fuzz_target;
use spyword_client::protocol::ServerEvent;

fuzz_target!(|data: &[u8]| {
    // Raw-byte path, including serde_json's UTF-8 validation.
    let _ = serde_json::from_slice::<ServerEvent>(data);

    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(event) = serde_json::from_str::<ServerEvent>(s) {
            // Whatever parses must serialize back under the same name.
            let json = serde_json::to_string(&event).unwrap();
            let again: ServerEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(again.kind(), event.kind());
        }
    }
});
