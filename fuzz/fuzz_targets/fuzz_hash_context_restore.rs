#![no_main]

use libfuzzer_sys::fuzz_target;
use lwm2m_session::security::{Sha1Context, Sha256Context};

fuzz_target!(|data: &[u8]| {
    let _ = Sha256Context::restore_context(data);
    let _ = Sha1Context::restore_context(data);
});
