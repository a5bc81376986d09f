//! Box-to-store pipe.
//!
//! Boxes encode into a synchronous `Write`; stores consume an `AsyncRead`.
//! [`store_box`] joins the two through an in-memory duplex pipe: the
//! calling (blocking) thread encodes into the write half while a runtime
//! task uploads from the read half. Dropping the write half after encoding
//! is what gives the uploader its end of stream.

use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::io::SyncIoBridge;
use tokio_util::sync::CancellationToken;
use vidi_common::{Error, Result};
use vidi_media::{Encode, SegmentSink};

use super::{paths, BoxStore};

/// Buffer between encoder and uploader.
pub const PIPE_CAPACITY: usize = 64 * 1024;

/// Encode `artifact` and store it under `name`.
///
/// Must run outside the async runtime (e.g. inside `spawn_blocking`), since
/// it blocks on the upload task.
pub fn store_box(
    handle: &Handle,
    store: &Arc<dyn BoxStore>,
    name: &str,
    artifact: &dyn Encode,
    cancel: &CancellationToken,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);
    let size = artifact.size();

    let upload = {
        let store = Arc::clone(store);
        let name = name.to_string();
        let cancel = cancel.clone();
        handle.spawn(async move {
            tokio::select! {
                result = store.put(&name, Box::new(reader), size) => result,
                _ = cancel.cancelled() => Err(Error::Cancelled),
            }
        })
    };

    let mut sink = SyncIoBridge::new_with_handle(writer, handle.clone());
    let encoded = artifact.encode(&mut sink).and_then(|()| sink.shutdown());
    drop(sink);

    let uploaded = handle
        .block_on(upload)
        .map_err(|e| Error::internal(format!("upload task for {name} failed: {e}")))?;

    match (encoded, uploaded) {
        (Ok(()), Ok(())) => Ok(()),
        (Ok(()), Err(upload_err)) => Err(upload_err),
        (Err(encode_err), Ok(())) => Err(Error::storage(format!(
            "encode {name}: {encode_err}"
        ))),
        (Err(_), Err(upload_err)) if upload_err.is_cancelled() => Err(Error::Cancelled),
        (Err(encode_err), Err(upload_err)) => Err(Error::storage(format!(
            "{upload_err}; encode {name}: {encode_err}"
        ))),
    }
}

/// Segment sink writing into a directory of a box store.
pub struct StoreSink {
    handle: Handle,
    store: Arc<dyn BoxStore>,
    dir: String,
    cancel: CancellationToken,
    written: Vec<String>,
}

impl StoreSink {
    pub fn new(
        handle: Handle,
        store: Arc<dyn BoxStore>,
        dir: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            handle,
            store,
            dir: dir.into(),
            cancel,
            written: Vec::new(),
        }
    }

    /// Full names of the objects stored so far, in write order.
    pub fn written(&self) -> &[String] {
        &self.written
    }
}

impl SegmentSink for StoreSink {
    fn store(&mut self, name: &str, artifact: &dyn Encode) -> Result<()> {
        let full_name = paths::join(&[&self.dir, name]);
        store_box(&self.handle, &self.store, &full_name, artifact, &self.cancel)?;
        tracing::trace!(object = %full_name, size = artifact.size(), "Stored box");
        self.written.push(full_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::io::{self, Write};

    /// Writes `data`, but may claim a different size.
    struct Blob {
        data: Vec<u8>,
        claimed: u64,
    }

    impl Blob {
        fn honest(data: Vec<u8>) -> Self {
            let claimed = data.len() as u64;
            Self { data, claimed }
        }
    }

    impl Encode for Blob {
        fn size(&self) -> u64 {
            self.claimed
        }

        fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
            // Small writes exercise the pipe back-pressure.
            for chunk in self.data.chunks(1000) {
                w.write_all(chunk)?;
            }
            Ok(())
        }
    }

    fn run(memory: &MemoryStore, name: &str, blob: Blob, cancel: CancellationToken) -> Result<()> {
        let store: Arc<dyn BoxStore> = Arc::new(memory.clone());
        store_box(&Handle::current(), &store, name, &blob, &cancel)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn streams_large_box_through_pipe() {
        let memory = MemoryStore::new();
        let data: Vec<u8> = (0..300_000u32).map(|i| i as u8).collect();
        let expected = data.clone();

        let m = memory.clone();
        tokio::task::spawn_blocking(move || {
            run(&m, "watch/x/vide1_1.m4s", Blob::honest(data), CancellationToken::new())
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(memory.object("watch/x/vide1_1.m4s").unwrap(), expected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn size_mismatch_is_storage_error() {
        let memory = MemoryStore::new();
        let m = memory.clone();
        let err = tokio::task::spawn_blocking(move || {
            let blob = Blob {
                data: vec![7; 100],
                claimed: 150,
            };
            run(&m, "bad", blob, CancellationToken::new())
        })
        .await
        .unwrap()
        .unwrap_err();

        assert!(matches!(err, Error::Storage(_)), "{err}");
        assert!(!memory.contains("bad"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancelled_before_start() {
        let memory = MemoryStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let m = memory.clone();
        let err = tokio::task::spawn_blocking(move || run(&m, "x", Blob::honest(vec![1]), cancel))
            .await
            .unwrap()
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(memory.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sink_prefixes_names() {
        let memory = MemoryStore::new();
        let store: Arc<dyn BoxStore> = Arc::new(memory.clone());
        let handle = Handle::current();

        let written = tokio::task::spawn_blocking(move || {
            let mut sink = StoreSink::new(handle, store, "watch/loc", CancellationToken::new());
            sink.store("vide1_init.mp4", &Blob::honest(b"init".to_vec()))
                .unwrap();
            sink.written().to_vec()
        })
        .await
        .unwrap();

        assert_eq!(written, vec!["watch/loc/vide1_init.mp4".to_string()]);
        assert_eq!(memory.object("watch/loc/vide1_init.mp4").unwrap(), &b"init"[..]);
    }
}
