//! Box store on the local filesystem.

use async_trait::async_trait;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use vidi_common::{Error, Result};

use super::{check_size, BoxReader, BoxStore};

/// Objects are files under `root`; names map to relative paths.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path of `name`, rejecting names that escape the root.
    fn path(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if name.is_empty() || escapes {
            return Err(Error::invalid_input(format!("invalid object name: {name:?}")));
        }
        Ok(self.root.join(relative))
    }

    async fn open(&self, name: &str) -> Result<(fs::File, u64)> {
        let path = self.path(name)?;
        let file = fs::File::open(&path).await.map_err(|e| not_found(e, name))?;
        let size = file.metadata().await?.len();
        Ok((file, size))
    }
}

fn not_found(err: std::io::Error, name: &str) -> Error {
    if err.kind() == ErrorKind::NotFound {
        Error::not_found("object", name)
    } else {
        Error::Io(err)
    }
}

#[async_trait]
impl BoxStore for FsStore {
    async fn put(&self, name: &str, reader: BoxReader, size: u64) -> Result<()> {
        let path = self.path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write beside the target and rename once the byte count checks out.
        let mut partial = path.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);
        let mut file = fs::File::create(&partial).await?;
        let copied = tokio::io::copy(&mut reader.take(size + 1), &mut file).await;
        let result = match copied {
            Ok(written) => check_size(name, written, size),
            Err(e) => Err(Error::storage(format!("put {name}: {e}"))),
        };
        let result = match result {
            Ok(()) => file.flush().await.map_err(Error::from),
            Err(e) => Err(e),
        };
        drop(file);

        match result {
            Ok(()) => {
                fs::rename(&partial, &path).await?;
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                Err(e)
            }
        }
    }

    async fn get(&self, name: &str) -> Result<(BoxReader, u64)> {
        let (file, size) = self.open(name).await?;
        Ok((Box::new(file), size))
    }

    async fn get_range(&self, name: &str, offset: u64) -> Result<BoxReader> {
        let (mut file, _) = self.open(name).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        Ok(Box::new(file))
    }

    async fn size(&self, name: &str) -> Result<u64> {
        let path = self.path(name)?;
        let meta = fs::metadata(&path).await.map_err(|e| not_found(e, name))?;
        Ok(meta.len())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self.path(name)?;
        fs::remove_file(&path).await.map_err(|e| not_found(e, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_escaping_names() {
        let store = FsStore::new("/tmp/vidi");
        assert!(store.path("../etc/passwd").is_err());
        assert!(store.path("a/../../b").is_err());
        assert!(store.path("").is_err());
        assert_eq!(
            store.path("/watch/loc/vide1_1.m4s").unwrap(),
            PathBuf::from("/tmp/vidi/watch/loc/vide1_1.m4s")
        );
    }

    fn reader(bytes: &[u8]) -> BoxReader {
        Box::new(std::io::Cursor::new(bytes.to_vec()))
    }

    #[tokio::test]
    async fn short_put_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        let err = store
            .put("watch/loc/vide1_1.m4s", reader(b"abc"), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)), "{err}");

        let target = dir.path().join("watch/loc/vide1_1.m4s");
        assert!(!target.exists());
        assert!(!dir.path().join("watch/loc/vide1_1.m4s.partial").exists());
        assert!(matches!(
            store.size("watch/loc/vide1_1.m4s").await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn failed_put_keeps_previous_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        store.put("a/obj", reader(b"first"), 5).await.unwrap();

        assert!(store.put("a/obj", reader(b"sec"), 6).await.is_err());
        assert!(store.put("a/obj", reader(b"too long"), 3).await.is_err());

        assert_eq!(std::fs::read(dir.path().join("a/obj")).unwrap(), b"first");
        assert!(!dir.path().join("a/obj.partial").exists());
    }
}
