//! Box store: named binary objects with known sizes.
//!
//! Backends implement [`BoxStore`]. Every `put` transfers exactly the
//! declared number of bytes or fails with `Storage` and leaves no partial
//! object behind.

pub mod bridge;
mod fs;
mod memory;
pub mod paths;
mod s3;

pub use bridge::{store_box, StoreSink};
pub use fs::FsStore;
pub use memory::MemoryStore;
pub use s3::S3Store;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use vidi_common::{Error, Result};

use crate::config::{Config, StorageBackend};

/// Streaming body of an object.
pub type BoxReader = Box<dyn AsyncRead + Send + Unpin>;

/// Object storage for uploads and segments.
#[async_trait]
pub trait BoxStore: Send + Sync {
    /// Store `size` bytes from `reader` under `name`.
    async fn put(&self, name: &str, reader: BoxReader, size: u64) -> Result<()>;

    /// Stream an object; returns the reader and the full object length.
    async fn get(&self, name: &str) -> Result<(BoxReader, u64)>;

    /// Stream an object starting at byte `offset`.
    async fn get_range(&self, name: &str, offset: u64) -> Result<BoxReader>;

    /// Object length in bytes.
    async fn size(&self, name: &str) -> Result<u64>;

    async fn delete(&self, name: &str) -> Result<()>;
}

/// Store an in-memory buffer.
pub async fn put_bytes(store: &dyn BoxStore, name: &str, data: Vec<u8>) -> Result<()> {
    let size = data.len() as u64;
    store
        .put(name, Box::new(std::io::Cursor::new(data)), size)
        .await
}

/// Read a whole object into memory.
pub async fn get_bytes(store: &dyn BoxStore, name: &str) -> Result<Vec<u8>> {
    let (mut reader, size) = store.get(name).await?;
    let mut data = Vec::with_capacity(size as usize);
    reader.read_to_end(&mut data).await?;
    Ok(data)
}

/// Drain `reader`, requiring exactly `size` bytes.
pub(crate) async fn read_exact_size(name: &str, reader: BoxReader, size: u64) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(size.min(64 << 20) as usize);
    // One byte past `size` is enough to detect an overlong stream.
    reader.take(size + 1).read_to_end(&mut data).await?;
    check_size(name, data.len() as u64, size)?;
    Ok(data)
}

/// Fail with `Storage` unless `written == expected`.
pub(crate) fn check_size(name: &str, written: u64, expected: u64) -> Result<()> {
    if written != expected {
        return Err(Error::storage(format!(
            "put {name}: transferred {written} bytes, expected {expected}"
        )));
    }
    Ok(())
}

/// Build the store selected by `[storage]`.
pub async fn from_config(config: &Config) -> Result<Arc<dyn BoxStore>> {
    match config.storage.backend {
        StorageBackend::S3 => Ok(Arc::new(S3Store::from_config(&config.s3).await)),
        StorageBackend::Fs => Ok(Arc::new(FsStore::new(&config.storage.root))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exact_size_accepts_matching_stream() {
        let data = read_exact_size("x", Box::new(&b"abcd"[..]), 4).await.unwrap();
        assert_eq!(data, b"abcd");
    }

    #[tokio::test]
    async fn exact_size_rejects_short_and_long_streams() {
        let short = read_exact_size("x", Box::new(&b"abc"[..]), 4).await;
        assert!(matches!(short, Err(Error::Storage(_))));
        let long = read_exact_size("x", Box::new(&b"abcde"[..]), 4).await;
        assert!(matches!(long, Err(Error::Storage(_))));
    }
}
