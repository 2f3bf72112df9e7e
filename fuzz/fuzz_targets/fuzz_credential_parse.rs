#![no_main]

use libfuzzer_sys::fuzz_target;
use lwm2m_session::credential_store::Document;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let _ = Document::parse(text);
});
