//! Asset lifecycle types: video records, statuses, and upload parts.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::ids::{UserId, VideoId};
use crate::meta::Meta;

/// Lifecycle status of a video asset.
///
/// The wire form is the lowercase name; the numeric form is what gets
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Error,
    Created,
    Uploading,
    Uploaded,
    Processing,
    Ready,
}

impl Status {
    /// All statuses in numeric order.
    pub const ALL: [Status; 6] = [
        Status::Error,
        Status::Created,
        Status::Uploading,
        Status::Uploaded,
        Status::Processing,
        Status::Ready,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Error => "error",
            Status::Created => "created",
            Status::Uploading => "uploading",
            Status::Uploaded => "uploaded",
            Status::Processing => "processing",
            Status::Ready => "ready",
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            Status::Error => -1,
            Status::Created => 0,
            Status::Uploading => 1,
            Status::Uploaded => 2,
            Status::Processing => 3,
            Status::Ready => 4,
        }
    }

    /// Whether moving from `self` to `next` follows the lifecycle DAG.
    ///
    /// `error` is reachable from every state. Otherwise the status only moves
    /// forward, and both `error` and `ready` are terminal.
    pub fn can_transition_to(&self, next: Status) -> bool {
        match (self, next) {
            (_, Status::Error) => true,
            (Status::Error, _) | (Status::Ready, _) => false,
            (current, next) => next.as_i32() > current.as_i32(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::IncorrectStatus(s.to_string()))
    }
}

impl TryFrom<i32> for Status {
    type Error = Error;

    fn try_from(n: i32) -> Result<Self> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_i32() == n)
            .ok_or_else(|| Error::IncorrectStatus(n.to_string()))
    }
}

/// A video asset record as seen by the processing core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: VideoId,
    pub user_id: UserId,
    pub status: Status,
    #[serde(default)]
    pub location: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_info: Option<UploadInfo>,
}

impl Video {
    /// A fresh record in `created` state.
    pub fn new(id: VideoId, user_id: UserId) -> Self {
        Self {
            id,
            user_id,
            status: Status::Created,
            location: String::new(),
            created_at: Utc::now(),
            playback_meta: None,
            upload_info: None,
        }
    }

    /// Apply a checked status transition.
    ///
    /// Leaving `created` for anything but `error` requires a location.
    /// Playback metadata is dropped on any transition other than to `ready`.
    pub fn transition(&mut self, next: Status) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::IncorrectStatus(format!(
                "{} -> {}",
                self.status, next
            )));
        }
        if self.status == Status::Created && next != Status::Error && self.location.is_empty() {
            return Err(Error::EmptyLocation(self.id.to_string()));
        }
        if next != Status::Ready {
            self.playback_meta = None;
        }
        self.status = next;
        Ok(())
    }

    /// Transition to `ready` together with its playback metadata.
    pub fn complete(&mut self, meta: Meta) -> Result<()> {
        meta.validate()?;
        self.transition(Status::Ready)?;
        self.playback_meta = Some(meta);
        Ok(())
    }

    /// Whether the upload was split into parts.
    pub fn is_multipart(&self) -> bool {
        self.upload_info
            .as_ref()
            .is_some_and(|info| !info.parts.is_empty())
    }
}

/// Upload state of a single part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartStatus {
    #[default]
    InProgress,
    Invalid,
    Ok,
}

/// One part of a multi-part upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub num: u32,
    pub size: u64,
    /// Base64 (standard alphabet) SHA-256 of the part contents.
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub status: PartStatus,
}

impl Part {
    /// Base64 SHA-256 digest of `bytes`, as stored in [`Part::checksum`].
    pub fn checksum_of(bytes: &[u8]) -> String {
        STANDARD.encode(Sha256::digest(bytes))
    }

    /// Check `bytes` against the recorded size and checksum.
    pub fn verify(&self, bytes: &[u8]) -> bool {
        bytes.len() as u64 == self.size && Self::checksum_of(bytes) == self.checksum
    }
}

/// Upload layout of a video: total size and its parts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UploadInfo {
    #[serde(default)]
    pub url: String,
    pub size: u64,
    pub part_size: u64,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl UploadInfo {
    /// Number of parts needed to cover `size` with `part_size` chunks.
    pub fn expected_part_count(&self) -> u32 {
        if self.part_size == 0 {
            return 0;
        }
        self.size.div_ceil(self.part_size) as u32
    }

    /// Size the part numbered `num` must have.
    pub fn expected_part_size(&self, num: u32) -> Result<u64> {
        let count = self.expected_part_count();
        if num >= count {
            return Err(Error::out_of_bounds(format!(
                "part {num} of {count}"
            )));
        }
        if num + 1 < count {
            Ok(self.part_size)
        } else {
            Ok(self.size - self.part_size * u64::from(count - 1))
        }
    }

    /// Check dense numbering, per-part sizes, and the aggregate size.
    pub fn validate(&self) -> Result<()> {
        if self.part_size == 0 {
            return Err(Error::invalid_input("part_size must be positive"));
        }
        if self.parts.len() != self.expected_part_count() as usize {
            return Err(Error::invalid_input(format!(
                "expected {} parts, got {}",
                self.expected_part_count(),
                self.parts.len()
            )));
        }
        let mut total = 0u64;
        for (idx, part) in self.parts.iter().enumerate() {
            if part.num as usize != idx {
                return Err(Error::out_of_bounds(format!(
                    "part at position {idx} has number {}",
                    part.num
                )));
            }
            let expected = self.expected_part_size(part.num)?;
            if part.size != expected {
                return Err(Error::invalid_input(format!(
                    "part {} has size {}, expected {expected}",
                    part.num, part.size
                )));
            }
            total += part.size;
        }
        if total != self.size {
            return Err(Error::invalid_input(format!(
                "parts add up to {total} bytes, expected {}",
                self.size
            )));
        }
        Ok(())
    }
}
