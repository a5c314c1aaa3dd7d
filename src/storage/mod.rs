pub mod local;

pub use local::LocalFileStorage;

use crate::error::AppResult;
use async_trait::async_trait;

/// Blob store for uploaded files, addressed by stored file name.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn put(&self, name: &str, bytes: &[u8]) -> AppResult<()>;

    /// Removes a stored file. Returns `false` when nothing was stored under `name`.
    async fn delete(&self, name: &str) -> AppResult<bool>;
}
