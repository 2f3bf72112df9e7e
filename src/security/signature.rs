//! Package-signature verification — §4.6.
//!
//! PSS-RSA over a SHA-1 digest, the only signature scheme spec.md names.
//! Built-in firmware/software public keys are `const` DER byte arrays
//! looked up by package type, replacing the teacher's function-pointer
//! handler table pattern per the §9 redesign flag (no indirect dispatch
//! tables — a plain `match` over an enum instead, same shape as
//! [`crate::credential_store::CredentialStore::key_for`]).

use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::pss::{Signature, VerifyingKey};
use rsa::RsaPublicKey;
use sha1::Sha1;
use signature::hazmat::PrehashVerifier;

use crate::error::Lwm2mStatus;

/// Which built-in public key to verify a package signature against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageType {
    Firmware,
    Software,
}

/// Firmware public key, DER-encoded (PKCS#1 `RSAPublicKey`). Populated at
/// integration time with the deployment's real signing key; placeholder
/// here so the lookup table has a concrete home.
const FW_PUBLIC_KEY_DER: &[u8] = &[];

/// Software public key, DER-encoded. See [`FW_PUBLIC_KEY_DER`].
const SW_PUBLIC_KEY_DER: &[u8] = &[];

fn builtin_key_der(kind: PackageType) -> &'static [u8] {
    match kind {
        PackageType::Firmware => FW_PUBLIC_KEY_DER,
        PackageType::Software => SW_PUBLIC_KEY_DER,
    }
}

/// Parse a DER-encoded RSA public key, trying PKCS#1 first and falling
/// back to SubjectPublicKeyInfo (spec.md §4.6 — some vendors ship one
/// encoding, some the other, and the client accepts either).
fn parse_public_key(der: &[u8]) -> Result<RsaPublicKey, Lwm2mStatus> {
    if let Ok(key) = RsaPublicKey::from_pkcs1_der(der) {
        return Ok(key);
    }
    RsaPublicKey::from_public_key_der(der).map_err(|_| Lwm2mStatus::InvalidArg)
}

/// Verify `signature` over `digest` (a SHA-1 hash of the package) using
/// the built-in public key for `kind`.
pub fn verify(kind: PackageType, digest: &[u8; 20], signature: &[u8]) -> Result<(), Lwm2mStatus> {
    let der = builtin_key_der(kind);
    if der.is_empty() {
        return Err(Lwm2mStatus::NotYetImplemented);
    }
    verify_with_der(der, digest, signature)
}

/// Same as [`verify`] but against a caller-supplied DER public key, so
/// tests can exercise real verification without a built-in key on hand.
fn verify_with_der(der: &[u8], digest: &[u8; 20], signature: &[u8]) -> Result<(), Lwm2mStatus> {
    let public_key = parse_public_key(der)?;
    let verifying_key = VerifyingKey::<Sha1>::new(public_key);
    let sig = Signature::try_from(signature).map_err(|_| Lwm2mStatus::InvalidArg)?;

    verifying_key
        .verify_prehash(digest, &sig)
        .map_err(|_| Lwm2mStatus::GeneralError)
}
