//! Streaming SHA-1/SHA-256 with suspend/resume — §4.6.
//!
//! `start → process(bytes) → end(expected)` state machines, each exposing
//! `copy_context`/`restore_context` so the session manager can persist
//! mid-download hash state across a reboot via
//! [`crate::parameter_store::ParameterStore`].
//!
//! Built on the `sha1`/`sha2` crates' block-compression primitives
//! (`sha1::compress` / `sha2::compress256`) rather than their high-level
//! `Digest` API, because the high-level API doesn't expose raw state for
//! persistence — the compression functions are the documented low-level
//! entry point the RustCrypto hashes publish for exactly this use case.

use generic_array::typenum::U64;
use generic_array::GenericArray;

use crate::error::Lwm2mStatus;

const BLOCK_SIZE: usize = 64;

// ---------------------------------------------------------------------------
// SHA-256
// ---------------------------------------------------------------------------

const SHA256_IV: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

/// Streaming SHA-256 context.
#[derive(Clone)]
pub struct Sha256Context {
    state: [u32; 8],
    buffer: [u8; BLOCK_SIZE],
    buffer_len: usize,
    total_len: u64,
}

impl Sha256Context {
    pub fn start() -> Self {
        Self {
            state: SHA256_IV,
            buffer: [0u8; BLOCK_SIZE],
            buffer_len: 0,
            total_len: 0,
        }
    }

    pub fn process(&mut self, mut data: &[u8]) {
        self.total_len += data.len() as u64;

        if self.buffer_len > 0 {
            let take = (BLOCK_SIZE - self.buffer_len).min(data.len());
            self.buffer[self.buffer_len..self.buffer_len + take].copy_from_slice(&data[..take]);
            self.buffer_len += take;
            data = &data[take..];
            if self.buffer_len == BLOCK_SIZE {
                let block = *GenericArray::<u8, U64>::from_slice(&self.buffer);
                sha2::compress256(&mut self.state, std::slice::from_ref(&block));
                self.buffer_len = 0;
            }
        }

        while data.len() >= BLOCK_SIZE {
            let block = *GenericArray::<u8, U64>::from_slice(&data[..BLOCK_SIZE]);
            sha2::compress256(&mut self.state, std::slice::from_ref(&block));
            data = &data[BLOCK_SIZE..];
        }

        if !data.is_empty() {
            self.buffer[..data.len()].copy_from_slice(data);
            self.buffer_len = data.len();
        }
    }

    /// Finalise and return the 32-byte digest.
    pub fn finish(mut self) -> [u8; 32] {
        let bit_len = self.total_len * 8;
        let mut pad = [0u8; BLOCK_SIZE * 2];
        pad[0] = 0x80;
        let remaining = BLOCK_SIZE - self.buffer_len;
        let pad_len = if remaining >= 9 { remaining } else { remaining + BLOCK_SIZE };
        pad[pad_len - 8..pad_len].copy_from_slice(&bit_len.to_be_bytes());

        // `buffer_len + pad_len` is always a multiple of `BLOCK_SIZE` (64 or
        // 128 bytes) by construction above, so the still-buffered tail and
        // the padding must be concatenated into one block run and
        // compressed together, not compressed as two independent pieces.
        let buffer_len = self.buffer_len;
        let mut last_blocks = [0u8; BLOCK_SIZE * 3];
        last_blocks[..buffer_len].copy_from_slice(&self.buffer[..buffer_len]);
        last_blocks[buffer_len..buffer_len + pad_len].copy_from_slice(&pad[..pad_len]);
        let total = buffer_len + pad_len;

        for chunk in last_blocks[..total].chunks_exact(BLOCK_SIZE) {
            let block = *GenericArray::<u8, U64>::from_slice(chunk);
            sha2::compress256(&mut self.state, std::slice::from_ref(&block));
        }

        let mut out = [0u8; 32];
        for (i, word) in self.state.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
        }
        out
    }

    /// Finalise and compare against an expected lowercase-hex digest
    /// (spec.md §4.6 `endAndCheckSha256`).
    pub fn end_and_check(self, expected_hex: &str) -> Result<(), Lwm2mStatus> {
        let digest = self.finish();
        let actual_hex = hex::encode(digest);
        if actual_hex.eq_ignore_ascii_case(expected_hex) {
            Ok(())
        } else {
            Err(Lwm2mStatus::ShaDigestMismatch)
        }
    }

    /// Serialise the context for persistence (§4.6 `copyContext`).
    pub fn copy_context(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 * 4 + BLOCK_SIZE + 8 + 8);
        for w in self.state {
            out.extend_from_slice(&w.to_le_bytes());
        }
        out.extend_from_slice(&self.buffer);
        out.extend_from_slice(&(self.buffer_len as u64).to_le_bytes());
        out.extend_from_slice(&self.total_len.to_le_bytes());
        out
    }

    /// Restore a context previously produced by [`Self::copy_context`].
    pub fn restore_context(bytes: &[u8]) -> Result<Self, Lwm2mStatus> {
        if bytes.len() != 8 * 4 + BLOCK_SIZE + 8 + 8 {
            return Err(Lwm2mStatus::InvalidArg);
        }
        let mut state = [0u32; 8];
        for (i, chunk) in bytes[..32].chunks_exact(4).enumerate() {
            state[i] = u32::from_le_bytes(chunk.try_into().unwrap());
        }
        let mut buffer = [0u8; BLOCK_SIZE];
        buffer.copy_from_slice(&bytes[32..32 + BLOCK_SIZE]);
        let buffer_len = u64::from_le_bytes(bytes[32 + BLOCK_SIZE..40 + BLOCK_SIZE].try_into().unwrap()) as usize;
        let total_len = u64::from_le_bytes(bytes[40 + BLOCK_SIZE..48 + BLOCK_SIZE].try_into().unwrap());
        if buffer_len > BLOCK_SIZE {
            return Err(Lwm2mStatus::InvalidArg);
        }
        Ok(Self {
            state,
            buffer,
            buffer_len,
            total_len,
        })
    }
}

// ---------------------------------------------------------------------------
// SHA-1
// ---------------------------------------------------------------------------

const SHA1_IV: [u32; 5] = [0x67452301, 0xEFCDAB89, 0x98BADCFE, 0x10325476, 0xC3D2E1F0];

/// Streaming SHA-1 context, used only for package-signature verification
/// (§4.6) — never for integrity checks, which use SHA-256.
#[derive(Clone)]
pub struct Sha1Context {
    state: [u32; 5],
    buffer: [u8; BLOCK_SIZE],
    buffer_len: usize,
    total_len: u64,
}

impl Sha1Context {
    pub fn start() -> Self {
        Self {
            state: SHA1_IV,
            buffer: [0u8; BLOCK_SIZE],
            buffer_len: 0,
            total_len: 0,
        }
    }

    pub fn process(&mut self, mut data: &[u8]) {
        self.total_len += data.len() as u64;

        if self.buffer_len > 0 {
            let take = (BLOCK_SIZE - self.buffer_len).min(data.len());
            self.buffer[self.buffer_len..self.buffer_len + take].copy_from_slice(&data[..take]);
            self.buffer_len += take;
            data = &data[take..];
            if self.buffer_len == BLOCK_SIZE {
                let block = *GenericArray::<u8, U64>::from_slice(&self.buffer);
                sha1::compress(&mut self.state, std::slice::from_ref(&block));
                self.buffer_len = 0;
            }
        }

        while data.len() >= BLOCK_SIZE {
            let block = *GenericArray::<u8, U64>::from_slice(&data[..BLOCK_SIZE]);
            sha1::compress(&mut self.state, std::slice::from_ref(&block));
            data = &data[BLOCK_SIZE..];
        }

        if !data.is_empty() {
            self.buffer[..data.len()].copy_from_slice(data);
            self.buffer_len = data.len();
        }
    }

    pub fn finish(mut self) -> [u8; 20] {
        let bit_len = self.total_len * 8;
        let mut pad = [0u8; BLOCK_SIZE * 2];
        pad[0] = 0x80;
        let remaining = BLOCK_SIZE - self.buffer_len;
        let pad_len = if remaining >= 9 { remaining } else { remaining + BLOCK_SIZE };
        pad[pad_len - 8..pad_len].copy_from_slice(&bit_len.to_be_bytes());

        // As in `Sha256Context::finish`: the buffered tail and the padding
        // together always total a multiple of `BLOCK_SIZE`, so they must be
        // compressed as one concatenated run rather than independently.
        let buffer_len = self.buffer_len;
        let mut last_blocks = [0u8; BLOCK_SIZE * 3];
        last_blocks[..buffer_len].copy_from_slice(&self.buffer[..buffer_len]);
        last_blocks[buffer_len..buffer_len + pad_len].copy_from_slice(&pad[..pad_len]);
        let total = buffer_len + pad_len;

        for chunk in last_blocks[..total].chunks_exact(BLOCK_SIZE) {
            let block = *GenericArray::<u8, U64>::from_slice(chunk);
            sha1::compress(&mut self.state, std::slice::from_ref(&block));
        }

        let mut out = [0u8; 20];
        for (i, word) in self.state.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
        }
        out
    }

    pub fn copy_context(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5 * 4 + BLOCK_SIZE + 8 + 8);
        for w in self.state {
            out.extend_from_slice(&w.to_le_bytes());
        }
        out.extend_from_slice(&self.buffer);
        out.extend_from_slice(&(self.buffer_len as u64).to_le_bytes());
        out.extend_from_slice(&self.total_len.to_le_bytes());
        out
    }

    pub fn restore_context(bytes: &[u8]) -> Result<Self, Lwm2mStatus> {
        if bytes.len() != 5 * 4 + BLOCK_SIZE + 8 + 8 {
            return Err(Lwm2mStatus::InvalidArg);
        }
        let mut state = [0u32; 5];
        for (i, chunk) in bytes[..20].chunks_exact(4).enumerate() {
            state[i] = u32::from_le_bytes(chunk.try_into().unwrap());
        }
        let mut buffer = [0u8; BLOCK_SIZE];
        buffer.copy_from_slice(&bytes[20..20 + BLOCK_SIZE]);
        let buffer_len = u64::from_le_bytes(bytes[20 + BLOCK_SIZE..28 + BLOCK_SIZE].try_into().unwrap()) as usize;
        let total_len = u64::from_le_bytes(bytes[28 + BLOCK_SIZE..36 + BLOCK_SIZE].try_into().unwrap());
        if buffer_len > BLOCK_SIZE {
            return Err(Lwm2mStatus::InvalidArg);
        }
        Ok(Self {
            state,
            buffer,
            buffer_len,
            total_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_abc() {
        let mut ctx = Sha256Context::start();
        ctx.process(b"abc");
        let digest = ctx.finish();
        assert_eq!(
            hex::encode(digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha256_streaming_matches_one_shot() {
        let mut one_shot = Sha256Context::start();
        one_shot.process(b"abc");
        let one_shot_digest = one_shot.finish();

        let mut streamed = Sha256Context::start();
        streamed.process(b"a");
        let saved = streamed.copy_context();
        let mut resumed = Sha256Context::restore_context(&saved).unwrap();
        resumed.process(b"bc");
        let streamed_digest = resumed.finish();

        assert_eq!(one_shot_digest, streamed_digest);
    }

    #[test]
    fn sha256_end_and_check_detects_mismatch() {
        let expected = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

        let mut ctx_ok = Sha256Context::start();
        ctx_ok.process(b"abc");
        assert!(ctx_ok.end_and_check(expected).is_ok());

        let mut ctx_bad = Sha256Context::start();
        ctx_bad.process(b"abd");
        assert_eq!(ctx_bad.end_and_check(expected), Err(Lwm2mStatus::ShaDigestMismatch));
    }

    #[test]
    fn sha1_streaming_matches_one_shot() {
        let mut one_shot = Sha1Context::start();
        one_shot.process(b"abc");
        let one_shot_digest = one_shot.finish();

        let mut streamed = Sha1Context::start();
        streamed.process(b"ab");
        let saved = streamed.copy_context();
        let mut resumed = Sha1Context::restore_context(&saved).unwrap();
        resumed.process(b"c");
        assert_eq!(one_shot_digest, resumed.finish());
    }

    #[test]
    fn sha1_known_answer() {
        let mut ctx = Sha1Context::start();
        ctx.process(b"abc");
        assert_eq!(hex::encode(ctx.finish()), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }
}
