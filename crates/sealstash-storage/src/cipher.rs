use aes::{
    cipher::{KeyIvInit, StreamCipher},
    Aes256,
};
use rand::{rngs::OsRng, RngCore};
use sealstash_core::{key::IV_LEN, KeyMaterial, Result, StoreError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// How the IV is chosen for each encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipherMode {
    /// The configured IV is reused for every encryption. Output is bare hex
    /// and deterministic. Reusing a CTR keystream leaks the XOR of any two
    /// plaintexts written under the same key; kept for existing files.
    #[default]
    FixedIv,
    /// A fresh random IV per encryption, stored next to the ciphertext in a
    /// JSON envelope. The configured IV is unused.
    RandomIv,
}

#[derive(Debug, Serialize, Deserialize)]
struct SealedEnvelope {
    iv: String,
    ciphertext: String,
}

/// AES-256-CTR over JSON text, hex encoded. Pure transform: no I/O and no
/// state beyond the key material.
#[derive(Debug, Clone)]
pub struct Cipher {
    material: KeyMaterial,
    mode: CipherMode,
}

impl Cipher {
    pub fn new(material: &KeyMaterial) -> Self {
        Self {
            material: material.clone(),
            mode: CipherMode::default(),
        }
    }

    pub fn from_hex(key_hex: &str, iv_hex: &str) -> Result<Self> {
        Ok(Self::new(&KeyMaterial::from_hex(key_hex, iv_hex)?))
    }

    pub fn with_mode(mut self, mode: CipherMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    /// Serialize `value` to JSON and encrypt it.
    pub fn encrypt<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let json = serde_json::to_vec(value).map_err(StoreError::encode)?;
        self.encrypt_bytes(&json)
    }

    /// Decrypt `text` and parse the plaintext as JSON into `T`.
    pub fn decrypt<T: DeserializeOwned>(&self, text: &str) -> Result<T> {
        let plaintext = self.decrypt_bytes(text)?;
        serde_json::from_slice(&plaintext).map_err(StoreError::decode)
    }

    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<String> {
        match self.mode {
            CipherMode::FixedIv => {
                let ciphertext = apply_keystream(&self.material, self.material.iv(), plaintext)?;
                Ok(hex::encode(ciphertext))
            }
            CipherMode::RandomIv => {
                let mut iv = [0u8; IV_LEN];
                OsRng.fill_bytes(&mut iv);
                let ciphertext = apply_keystream(&self.material, &iv, plaintext)?;
                let envelope = SealedEnvelope {
                    iv: hex::encode(iv),
                    ciphertext: hex::encode(ciphertext),
                };
                serde_json::to_string(&envelope).map_err(StoreError::encode)
            }
        }
    }

    pub fn decrypt_bytes(&self, text: &str) -> Result<Vec<u8>> {
        match self.mode {
            CipherMode::FixedIv => {
                let ciphertext = decode_hex(text.trim(), "ciphertext")?;
                apply_keystream(&self.material, self.material.iv(), &ciphertext)
            }
            CipherMode::RandomIv => {
                let envelope: SealedEnvelope =
                    serde_json::from_str(text).map_err(StoreError::decode)?;
                let iv: [u8; IV_LEN] = decode_hex(&envelope.iv, "iv")?
                    .try_into()
                    .map_err(|iv: Vec<u8>| StoreError::Decode {
                        reason: format!("iv must be {IV_LEN} bytes, got {}", iv.len()),
                    })?;
                let ciphertext = decode_hex(&envelope.ciphertext, "ciphertext")?;
                apply_keystream(&self.material, &iv, &ciphertext)
            }
        }
    }
}

fn apply_keystream(material: &KeyMaterial, iv: &[u8; IV_LEN], input: &[u8]) -> Result<Vec<u8>> {
    let mut cipher = Aes256Ctr::new_from_slices(material.key(), iv)
        .map_err(|e| StoreError::configuration(format!("cipher init failed: {e}")))?;
    let mut buf = input.to_vec();
    cipher.apply_keystream(&mut buf);
    Ok(buf)
}

fn decode_hex(text: &str, what: &str) -> Result<Vec<u8>> {
    hex::decode(text).map_err(|e| StoreError::Decode {
        reason: format!("{what} is not valid hex: {e}"),
    })
}
