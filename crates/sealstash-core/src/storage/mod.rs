//! Storage collaborator contract: whole-file load/persist of one text blob.

mod blob_backend;

pub use blob_backend::{BlobBackend, InMemoryBlobBackend};
