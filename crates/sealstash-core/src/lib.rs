//! Core abstractions for sealstash: the error taxonomy, key material and the
//! blob storage contract. This crate is intentionally small and free of crypto.

use std::collections::BTreeMap;

pub mod error;
pub mod key;
pub mod storage;

pub use error::{Result, StoreError};
pub use key::KeyMaterial;

/// The single logical unit of persisted state: every key and its JSON value.
pub type StoreMap = BTreeMap<String, serde_json::Value>;
