use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::{rngs::OsRng, RngCore};
use sealstash_core::{
    key::{IV_LEN, KEY_LEN},
    KeyMaterial, StoreError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("generation error: {0}")]
    Generation(String),
}

impl From<KeyError> for StoreError {
    fn from(err: KeyError) -> Self {
        StoreError::configuration(err.to_string())
    }
}

/// Supplies the key/IV pair a store is opened with (OS keychain in
/// production; memory in tests).
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError>;
}

/// Material handed over by the caller, e.g. from config or environment.
#[derive(Debug, Clone)]
pub struct StaticKeyProvider {
    material: KeyMaterial,
}

impl StaticKeyProvider {
    pub fn new(material: KeyMaterial) -> Self {
        Self { material }
    }

    pub fn from_hex(key_hex: &str, iv_hex: &str) -> Result<Self, KeyError> {
        KeyMaterial::from_hex(key_hex, iv_hex)
            .map(Self::new)
            .map_err(|e| KeyError::Decode(e.to_string()))
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        Ok(self.material.clone())
    }
}

/// OS keyring-backed provider. The entry holds `<key_hex>:<iv_hex>` and is
/// generated on first use.
pub struct KeyringProvider {
    service: String,
    account: String,
}

impl KeyringProvider {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }
}

#[async_trait]
impl KeyProvider for KeyringProvider {
    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        // Keyring operations are synchronous; wrap in async for trait compatibility.
        match keyring::Entry::new(&self.service, &self.account) {
            Ok(entry) => {
                if let Some(existing) = stored_material(entry.get_password())? {
                    return Ok(existing);
                }

                let material = generate_material()?;
                entry
                    .set_password(&encode_material(&material))
                    .map_err(|e| KeyError::Keyring(e.to_string()))?;
                Ok(material)
            }
            Err(err) => Err(KeyError::Keyring(err.to_string())),
        }
    }
}

/// In-memory key provider for tests and ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyProvider {
    inner: Arc<Mutex<Option<KeyMaterial>>>,
}

#[async_trait]
impl KeyProvider for InMemoryKeyProvider {
    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| KeyError::Generation(format!("lock poisoned: {err}")))?;

        if let Some(existing) = guard.clone() {
            return Ok(existing);
        }

        let material = generate_material()?;
        *guard = Some(material.clone());
        Ok(material)
    }
}

/// Fresh random key and IV from the OS RNG.
pub fn generate_material() -> Result<KeyMaterial, KeyError> {
    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut key);
    OsRng.fill_bytes(&mut iv);
    KeyMaterial::new(&key, &iv).map_err(|e| KeyError::Generation(e.to_string()))
}

/// Only a missing entry may lead to fresh material; any other keyring
/// failure must not overwrite the key the data file was written with.
fn stored_material(
    lookup: Result<String, keyring::Error>,
) -> Result<Option<KeyMaterial>, KeyError> {
    match lookup {
        Ok(secret) => decode_material(&secret).map(Some),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(KeyError::Keyring(err.to_string())),
    }
}

fn encode_material(material: &KeyMaterial) -> String {
    format!("{}:{}", material.key_hex(), material.iv_hex())
}

fn decode_material(secret: &str) -> Result<KeyMaterial, KeyError> {
    let (key_hex, iv_hex) = secret
        .split_once(':')
        .ok_or_else(|| KeyError::Decode("expected <key>:<iv>".to_string()))?;
    KeyMaterial::from_hex(key_hex, iv_hex).map_err(|e| KeyError::Decode(e.to_string()))
}
