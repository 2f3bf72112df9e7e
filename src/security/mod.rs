//! Package-download security primitives — §4.6.

pub mod crc32;
pub mod hash;
pub mod signature;

pub use crc32::Crc32Context;
pub use hash::{Sha1Context, Sha256Context};
pub use signature::{verify as verify_signature, PackageType};
