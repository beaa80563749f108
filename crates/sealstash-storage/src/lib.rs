//! Concrete encrypted key-value storage.
//! The whole map is encrypted with AES-256-CTR and written as one file.

pub mod cipher;
pub mod file_backend;
pub mod key_provider;
pub mod store;

pub use cipher::{Cipher, CipherMode};
pub use file_backend::FileBackend;
pub use store::{EncryptedStore, DATA_FILE_NAME};
