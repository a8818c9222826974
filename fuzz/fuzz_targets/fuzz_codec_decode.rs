#![no_main]

use datt_messages::{MsgHeader, HEADER_LEN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Header decoding on its own.
    if let Ok(header) = <&[u8; HEADER_LEN]>::try_from(data.get(..HEADER_LEN).unwrap_or_default()) {
        let _ = MsgHeader::decode(header);
    }

    // Stream framing: read frames until the input runs out or turns bad.
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    rt.block_on(async {
        let mut reader = data;
        while let Ok(Some(frame)) = datt_protocol::read_frame(&mut reader).await {
            let _ = datt_messages::Msg::from_bytes(&frame);
        }
    });
});
