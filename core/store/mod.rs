//! # Object Stores
//!
//! A minimal key/value blob interface the remote cache tier and source downloads are built on.
//!
mod fetch;
mod memory;
mod s3;

pub use fetch::*;
pub use memory::*;
pub use s3::*;

use async_trait::async_trait;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Fetches a blob. A missing key is `Ok(None)`, not an error.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ObjectStoreError>;

    async fn put(&self, key: &str, blob: Vec<u8>) -> Result<(), ObjectStoreError>;

    /// A human-readable location, used in logs.
    fn describe(&self) -> String;
}

#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("Could not read {key:?} from {store}: {source}")]
    Get {
        store: String,
        key: String,
        source: BoxError,
    },

    #[error("Could not write {key:?} to {store}: {source}")]
    Put {
        store: String,
        key: String,
        source: BoxError,
    },
}
