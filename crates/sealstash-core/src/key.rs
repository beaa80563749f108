use std::fmt;

use crate::error::{Result, StoreError};

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;
/// CTR initialization vector length in bytes.
pub const IV_LEN: usize = 16;

/// Key and IV used for encryption at rest, fixed for the lifetime of a store.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl KeyMaterial {
    /// Validate raw key/IV bytes. Lengths other than 32/16 are rejected here
    /// rather than on first use.
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LEN] = key.try_into().map_err(|_| {
            StoreError::configuration(format!(
                "key must be {KEY_LEN} bytes, got {}",
                key.len()
            ))
        })?;
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| {
            StoreError::configuration(format!("iv must be {IV_LEN} bytes, got {}", iv.len()))
        })?;
        Ok(Self { key, iv })
    }

    /// Parse a 64-char hex key and a 32-char hex IV.
    pub fn from_hex(key_hex: &str, iv_hex: &str) -> Result<Self> {
        let key = hex::decode(key_hex.trim())
            .map_err(|e| StoreError::configuration(format!("key is not valid hex: {e}")))?;
        let iv = hex::decode(iv_hex.trim())
            .map_err(|e| StoreError::configuration(format!("iv is not valid hex: {e}")))?;
        Self::new(&key, &iv)
    }

    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    pub fn key_hex(&self) -> String {
        hex::encode(self.key)
    }

    pub fn iv_hex(&self) -> String {
        hex::encode(self.iv)
    }
}

// Never print key bytes.
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key", &"<redacted>")
            .field("iv", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_HEX: &str = "de746182415c1a57acaa6e53b6eeb66be0c4d13cb6206d6a1dabf29422fe5581";
    const IV_HEX: &str = "a5cf58ee1df1343334a5ec799c237256";

    #[test]
    fn parses_hex_material() {
        let material = KeyMaterial::from_hex(KEY_HEX, IV_HEX).expect("valid hex");
        assert_eq!(material.key()[0], 0xde);
        assert_eq!(material.iv()[15], 0x56);
        assert_eq!(material.key_hex(), KEY_HEX);
        assert_eq!(material.iv_hex(), IV_HEX);
    }

    #[test]
    fn rejects_short_key() {
        let err = KeyMaterial::new(&[0u8; 16], &[0u8; IV_LEN]).expect_err("short key");
        assert!(matches!(err, StoreError::Configuration { .. }));
    }

    #[test]
    fn rejects_long_iv() {
        let err = KeyMaterial::new(&[0u8; KEY_LEN], &[0u8; 32]).expect_err("long iv");
        assert!(matches!(err, StoreError::Configuration { .. }));
    }

    #[test]
    fn rejects_non_hex() {
        let err = KeyMaterial::from_hex("zz", IV_HEX).expect_err("not hex");
        assert!(matches!(err, StoreError::Configuration { .. }));
    }

    #[test]
    fn debug_redacts_bytes() {
        let material = KeyMaterial::from_hex(KEY_HEX, IV_HEX).expect("valid hex");
        let printed = format!("{material:?}");
        assert!(!printed.contains("de7461"));
        assert!(printed.contains("redacted"));
    }
}
