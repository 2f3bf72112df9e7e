//! Property tests for the credential store, run on the host only.
//!
//! Mirrors the teacher's `tests/property_tests.rs` (crate-level proptest
//! file, separate from the integration-test tree).

use lwm2m_session::credential_store::{decode_hex, encode_hex, CredentialId, CredentialStore};
use proptest::prelude::*;

fn psk_bytes() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 1..16)
}

proptest! {
    /// §8 hex round-trip: for every byte slice, decode(encode(b)) == b,
    /// and decode is case-insensitive.
    #[test]
    fn hex_round_trip_any_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..128)) {
        let s = encode_hex(&bytes);
        prop_assert_eq!(decode_hex(&s).unwrap(), bytes.clone());
        prop_assert_eq!(decode_hex(&s.to_lowercase()).unwrap(), bytes);
    }

    /// §8 credential selection: setting a DM secret for a given server id
    /// and reading it back for the same id always round-trips, and a
    /// different id never observes it.
    #[test]
    fn dm_secret_set_get_is_scoped_by_server_id(
        id in 1u16..500,
        other_id in 500u16..1000,
        secret in psk_bytes(),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CredentialStore::open(dir.path().join("clientConfig.txt")).unwrap();

        store.set(CredentialId::DmSecretKey, id, &secret).unwrap();

        prop_assert_eq!(store.get(CredentialId::DmSecretKey, id).unwrap(), secret);
        prop_assert!(!store.check(CredentialId::DmSecretKey, other_id));
    }

    /// §8 write-one locality: repeatedly overwriting the same key never
    /// disturbs an unrelated key already present in the same section.
    #[test]
    fn repeated_overwrite_does_not_disturb_sibling_key(
        values in proptest::collection::vec("[a-zA-Z0-9]{1,20}", 1..10),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CredentialStore::open(dir.path().join("clientConfig.txt")).unwrap();
        store.write_one("GENERAL", "SN", "000").unwrap();

        for v in &values {
            store.write_one("GENERAL", "ENDPOINT", v).unwrap();
        }

        let config = store.config().unwrap();
        prop_assert_eq!(config.general.serial_number, "000");
        prop_assert_eq!(&config.general.endpoint, values.last().unwrap());
    }
}
