//! Incremental zlib-compatible CRC32 — §4.6.
//!
//! Thin wrapper over `crc32fast` exposing the `start/process/end` shape the
//! rest of §4.6 uses, so callers that stream a package through hash *and*
//! CRC32 checks (observation resume included) see one consistent API.

use crc32fast::Hasher;

#[derive(Default)]
pub struct Crc32Context(Hasher);

impl Crc32Context {
    pub fn start() -> Self {
        Self(Hasher::new())
    }

    pub fn process(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finish(self) -> u32 {
        self.0.finalize()
    }
}
