#![no_main]

use datt_messages::{Message, Msg};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Whole-frame decode, then tag dispatch on whatever survives.
    if let Ok(msg) = Msg::from_bytes(data) {
        assert_eq!(msg.to_bytes(), data);
        if let Ok(message) = Message::from_msg(&msg) {
            let _ = message.to_msg();
        }
        let _ = Message::decode_strict(&msg);
    }

    // Any bytes as the payload of each known tag.
    for cmd in ["ping", "pong", "contentauth"] {
        if let Ok(msg) = Msg::new(cmd, data.to_vec()) {
            let _ = Message::from_msg(&msg);
        }
    }
});
