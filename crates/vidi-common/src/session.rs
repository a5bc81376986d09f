//! Upload and watch session records.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ids::{SessionId, VideoId};

/// Default lifetime of an upload session.
pub const UPLOAD_SESSION_TTL: Duration = Duration::from_secs(300);
/// Default lifetime of a watch session.
pub const WATCH_SESSION_TTL: Duration = Duration::from_secs(600);

/// A short-lived session bound to one video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub video_id: VideoId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_size: Option<u64>,
}

impl Session {
    pub fn new(id: SessionId, video_id: VideoId) -> Self {
        Self {
            id,
            video_id,
            location: None,
            part_size: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = Some(part_size);
        self
    }
}
