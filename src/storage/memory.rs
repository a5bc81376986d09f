//! In-process box store.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::io::Cursor;
use std::sync::Arc;
use vidi_common::{Error, Result};

use super::{read_exact_size, BoxReader, BoxStore};

/// Map-backed store; clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<DashMap<String, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object directly.
    pub fn insert(&self, name: impl Into<String>, data: impl Into<Bytes>) {
        self.objects.insert(name.into(), data.into());
    }

    pub fn object(&self, name: &str) -> Option<Bytes> {
        self.objects.get(name).map(|o| o.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    /// Sorted object names under `prefix`.
    pub fn names(&self, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .objects
            .iter()
            .filter(|o| o.key().starts_with(prefix))
            .map(|o| o.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn lookup(&self, name: &str) -> Result<Bytes> {
        self.object(name)
            .ok_or_else(|| Error::not_found("object", name))
    }
}

#[async_trait]
impl BoxStore for MemoryStore {
    async fn put(&self, name: &str, reader: BoxReader, size: u64) -> Result<()> {
        let data = read_exact_size(name, reader, size).await?;
        self.objects.insert(name.to_string(), Bytes::from(data));
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<(BoxReader, u64)> {
        let data = self.lookup(name)?;
        let size = data.len() as u64;
        Ok((Box::new(Cursor::new(data)), size))
    }

    async fn get_range(&self, name: &str, offset: u64) -> Result<BoxReader> {
        let data = self.lookup(name)?;
        let start = (offset as usize).min(data.len());
        Ok(Box::new(Cursor::new(data.slice(start..))))
    }

    async fn size(&self, name: &str) -> Result<u64> {
        Ok(self.lookup(name)?.len() as u64)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.objects
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("object", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{get_bytes, put_bytes};
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn put_get_range_delete() {
        let store = MemoryStore::new();
        put_bytes(&store, "a/b", b"hello world".to_vec()).await.unwrap();

        assert_eq!(get_bytes(&store, "a/b").await.unwrap(), b"hello world");
        assert_eq!(store.size("a/b").await.unwrap(), 11);

        let mut tail = String::new();
        store
            .get_range("a/b", 6)
            .await
            .unwrap()
            .read_to_string(&mut tail)
            .await
            .unwrap();
        assert_eq!(tail, "world");

        store.delete("a/b").await.unwrap();
        assert!(matches!(
            store.get("a/b").await.err(),
            Some(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn short_put_leaves_nothing() {
        let store = MemoryStore::new();
        let err = store
            .put("x", Box::new(&b"abc"[..]), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(!store.contains("x"));
    }
}
