#![no_main]

use datt_content::ContentAuth;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Untrusted JSON into a ContentAuth; verification must never panic.
    if let Ok(content_auth) = serde_json::from_slice::<ContentAuth>(data) {
        let _ = content_auth.verify();
        let _ = content_auth.id();
    }
});
