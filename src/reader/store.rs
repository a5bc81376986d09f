//! Part opener backed by the box store.

use std::io::Read;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::io::SyncIoBridge;
use vidi_common::{Error, Result, Video};

use super::{MultipartReader, PartOpener};
use crate::storage::{paths, BoxStore};

/// How part numbers map to object names.
#[derive(Debug, Clone)]
enum PartNames {
    /// `<prefix>/<location>/<num>`
    Numbered { prefix: String, location: String },
    /// One object holding the whole upload.
    Single(String),
}

/// Opens upload parts with ranged store reads, bridged to blocking `Read`.
///
/// Used from blocking threads only; each open blocks on the runtime.
pub struct StorePartOpener {
    handle: Handle,
    store: Arc<dyn BoxStore>,
    names: PartNames,
}

impl StorePartOpener {
    /// Parts stored as `<prefix>/<location>/<num>`.
    pub fn numbered(handle: Handle, store: Arc<dyn BoxStore>, prefix: &str, location: &str) -> Self {
        Self {
            handle,
            store,
            names: PartNames::Numbered {
                prefix: prefix.to_string(),
                location: location.to_string(),
            },
        }
    }

    /// A single object read as part 0.
    pub fn single(handle: Handle, store: Arc<dyn BoxStore>, name: impl Into<String>) -> Self {
        Self {
            handle,
            store,
            names: PartNames::Single(name.into()),
        }
    }

    fn name(&self, num: u32) -> Result<String> {
        match &self.names {
            PartNames::Numbered { prefix, location } => Ok(paths::part_name(prefix, location, num)),
            PartNames::Single(name) if num == 0 => Ok(name.clone()),
            PartNames::Single(name) => Err(Error::out_of_bounds(format!(
                "part {num} requested from single object {name}"
            ))),
        }
    }
}

impl PartOpener for StorePartOpener {
    fn open(&self, num: u32, offset: u64) -> Result<Box<dyn Read + Send>> {
        let name = self.name(num)?;
        tracing::trace!(object = %name, offset, "Opening part reader");
        let reader = self.handle.block_on(self.store.get_range(&name, offset))?;
        Ok(Box::new(SyncIoBridge::new_with_handle(reader, self.handle.clone())))
    }
}

/// Reader over a video's upload.
///
/// Uses the numbered parts when `upload_info` lists any, otherwise the
/// legacy `artifact.mp4`. Blocks; call from a blocking thread.
pub fn open_upload(
    handle: &Handle,
    store: Arc<dyn BoxStore>,
    prefix: &str,
    video: &Video,
) -> Result<MultipartReader<StorePartOpener>> {
    match &video.upload_info {
        Some(info) if !info.parts.is_empty() => {
            info.validate()?;
            let opener =
                StorePartOpener::numbered(handle.clone(), store, prefix, &video.location);
            MultipartReader::new(opener, info.size, info.part_size)
        }
        _ => {
            let name = paths::artifact_name(prefix, &video.location);
            let size = handle.block_on(store.size(&name))?;
            let opener = StorePartOpener::single(handle.clone(), store, name);
            MultipartReader::new(opener, size, size.max(1))
        }
    }
}
