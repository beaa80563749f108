use std::path::{Path, PathBuf};

use crate::config::{Config, KeySource};
use color_eyre::Result;
use dirs::data_dir;
use sealstash_core::KeyMaterial;
use sealstash_storage::{
    key_provider::{KeyProvider, KeyringProvider, StaticKeyProvider},
    EncryptedStore,
};
use tracing::debug;

const KEY_ENV: &str = "SEALSTASH_KEY";
const IV_ENV: &str = "SEALSTASH_IV";

/// Resolve the default data directory for sealstash.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("sealstash"))
}

/// Build a store from config, with an optional directory override from the command line.
pub async fn store_from_config(config: &Config, data_dir: Option<&Path>) -> Result<EncryptedStore> {
    let root = match data_dir.or(config.data_dir.as_deref()) {
        Some(root) => root.to_path_buf(),
        None => default_data_dir()?,
    };
    let material = resolve_material(config, env_pair()).await?;
    debug!(?root, mode = ?config.mode, "initializing encrypted store");
    Ok(EncryptedStore::open_with_mode(
        root,
        &material,
        config.mode.into(),
    ))
}

fn env_pair() -> Option<(String, String)> {
    let key = std::env::var(KEY_ENV).ok()?;
    let iv = std::env::var(IV_ENV).ok()?;
    Some((key, iv))
}

/// Environment beats config; config hex is only read with `key_source = "config"`.
async fn resolve_material(config: &Config, env: Option<(String, String)>) -> Result<KeyMaterial> {
    if let Some((key_hex, iv_hex)) = env {
        debug!("using key material from environment");
        return Ok(StaticKeyProvider::from_hex(&key_hex, &iv_hex)?
            .get_or_create()
            .await?);
    }

    match config.key_source {
        KeySource::Config => {
            let (Some(key_hex), Some(iv_hex)) = (&config.key_hex, &config.iv_hex) else {
                color_eyre::eyre::bail!("key_source is \"config\" but key_hex/iv_hex are missing");
            };
            Ok(StaticKeyProvider::from_hex(key_hex, iv_hex)?
                .get_or_create()
                .await?)
        }
        KeySource::Keyring => Ok(KeyringProvider::new("sealstash", "data-key")
            .get_or_create()
            .await?),
    }
}

/// Helper for tests to construct a store rooted at a temp dir with an in-memory key.
#[cfg(test)]
pub async fn test_store(root: impl AsRef<Path>) -> EncryptedStore {
    let material = sealstash_storage::key_provider::InMemoryKeyProvider::default()
        .get_or_create()
        .await
        .expect("in-memory key material");
    EncryptedStore::open(root, &material)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_HEX: &str = "de746182415c1a57acaa6e53b6eeb66be0c4d13cb6206d6a1dabf29422fe5581";
    const IV_HEX: &str = "a5cf58ee1df1343334a5ec799c237256";

    #[tokio::test]
    async fn env_material_takes_precedence() {
        let config = Config {
            key_source: KeySource::Config,
            key_hex: Some("00".repeat(32)),
            iv_hex: Some("00".repeat(16)),
            ..Config::default()
        };
        let material = resolve_material(&config, Some((KEY_HEX.into(), IV_HEX.into())))
            .await
            .expect("resolve");
        assert_eq!(material.key_hex(), KEY_HEX);
    }

    #[tokio::test]
    async fn config_material_is_used() {
        let config = Config {
            key_source: KeySource::Config,
            key_hex: Some(KEY_HEX.into()),
            iv_hex: Some(IV_HEX.into()),
            ..Config::default()
        };
        let material = resolve_material(&config, None).await.expect("resolve");
        assert_eq!(material.iv_hex(), IV_HEX);
    }

    #[tokio::test]
    async fn config_source_without_hex_fails() {
        let config = Config {
            key_source: KeySource::Config,
            ..Config::default()
        };
        assert!(resolve_material(&config, None).await.is_err());
    }

    #[tokio::test]
    async fn malformed_env_material_fails() {
        let result = resolve_material(&Config::default(), Some(("abc".into(), IV_HEX.into()))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn data_dir_override_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            data_dir: Some(PathBuf::from("/should/not/be/used")),
            key_source: KeySource::Config,
            key_hex: Some(KEY_HEX.into()),
            iv_hex: Some(IV_HEX.into()),
            ..Config::default()
        };
        let store = store_from_config(&config, Some(dir.path()))
            .await
            .expect("store");
        assert_eq!(store.path(), dir.path().join("data.encrypted"));
    }
}
