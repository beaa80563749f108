//! Property tests for the cipher and the store's map semantics.

use proptest::prelude::*;
use sealstash_core::{storage::InMemoryBlobBackend, KeyMaterial, StoreError};
use sealstash_storage::{Cipher, CipherMode, EncryptedStore};
use serde_json::Value;

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        ".{0,24}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{0,8}", inner, 0..6)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn arb_material() -> impl Strategy<Value = KeyMaterial> {
    (any::<[u8; 32]>(), any::<[u8; 16]>())
        .prop_map(|(key, iv)| KeyMaterial::new(&key, &iv).expect("fixed-size arrays"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// decrypt(encrypt(v)) == v for any JSON value and key material.
    #[test]
    fn prop_roundtrip_preserves_value(value in arb_json(), material in arb_material()) {
        let cipher = Cipher::new(&material);
        let encrypted = cipher.encrypt(&value).expect("encrypt");
        let decrypted: Value = cipher.decrypt(&encrypted).expect("decrypt");
        prop_assert_eq!(decrypted, value);
    }

    #[test]
    fn prop_random_iv_roundtrip(value in arb_json(), material in arb_material()) {
        let cipher = Cipher::new(&material).with_mode(CipherMode::RandomIv);
        let encrypted = cipher.encrypt(&value).expect("encrypt");
        let decrypted: Value = cipher.decrypt(&encrypted).expect("decrypt");
        prop_assert_eq!(decrypted, value);
    }

    /// Hex of odd length never yields a value.
    #[test]
    fn prop_odd_length_hex_rejected(text in "([0-9a-f]{2}){0,31}[0-9a-f]") {
        let cipher = Cipher::new(&KeyMaterial::new(&[3u8; 32], &[4u8; 16]).expect("material"));
        let err = cipher.decrypt::<Value>(&text).expect_err("odd length");
        prop_assert!(matches!(err, StoreError::Decode { .. }), "expected Decode, got {:?}", err);
    }

    /// Writing one key never disturbs another.
    #[test]
    fn prop_keys_isolated(
        k1 in "[a-z]{1,8}",
        k2 in "[A-Z]{1,8}",
        v1 in arb_json(),
        v2 in arb_json(),
    ) {
        let store = EncryptedStore::with_backend(
            "/vault",
            Cipher::new(&KeyMaterial::new(&[5u8; 32], &[6u8; 16]).expect("material")),
            InMemoryBlobBackend::new(),
        );
        store.set(&k1, &v1).expect("set k1");
        store.set(&k2, &v2).expect("set k2");
        prop_assert_eq!(store.get_value(&k1).expect("get k1"), Some(v1));
        prop_assert_eq!(store.get_value(&k2).expect("get k2"), Some(v2));
    }
}
