//! Processor loop: turns uploaded videos into DASH segments.
//!
//! Every `video_check_period` the processor asks the video API for videos
//! in status `uploaded` and handles them one after another. Each upload is
//! opened through the multipart reader, segmented into
//! `<watch_prefix>/<location>` and reported as `ready` (with playback
//! metadata) or `error` through the notificator. A cancelled run reports
//! nothing.

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use vidi_common::{Error, Meta, Result, Status, Video};
use vidi_media::{Mp4File, ParseMode, Segmenter};

use crate::config::Config;
use crate::notificator::{Event, NotificationSender};
use crate::reader::open_upload;
use crate::storage::bridge::StoreSink;
use crate::storage::{paths, BoxStore};
use crate::videoapi::VideoApi;

/// Outcome of one video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ready,
    Failed,
    Cancelled,
}

/// Polls for uploaded videos and segments them.
pub struct Processor {
    api: Arc<dyn VideoApi>,
    store: Arc<dyn BoxStore>,
    notifier: NotificationSender,
    upload_prefix: String,
    watch_prefix: String,
    segment_duration: Duration,
    check_period: Duration,
    purge_uploads: bool,
}

impl Processor {
    pub fn new(
        config: &Config,
        api: Arc<dyn VideoApi>,
        store: Arc<dyn BoxStore>,
        notifier: NotificationSender,
    ) -> Self {
        Self {
            api,
            store,
            notifier,
            upload_prefix: config.s3.prefix.upload.clone(),
            watch_prefix: config.s3.prefix.watch.clone(),
            segment_duration: config.processor.segment_duration(),
            check_period: config.processor.video_check_period(),
            purge_uploads: config.processor.purge_uploads,
        }
    }

    /// Poll until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            period_secs = self.check_period.as_secs(),
            segment_secs = self.segment_duration.as_secs(),
            "Processor started"
        );

        let mut ticker = tokio::time::interval(self.check_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.check_and_process(&cancel).await;
        }

        tracing::info!("Processor shutting down");
    }

    /// One polling round. Returns the outcome per video, in order.
    pub async fn check_and_process(&self, cancel: &CancellationToken) -> Vec<Outcome> {
        let videos = match self.api.uploaded_videos().await {
            Ok(videos) => videos,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch uploaded videos");
                return Vec::new();
            }
        };

        if !videos.is_empty() {
            tracing::debug!(count = videos.len(), "Found uploaded videos");
        }

        let mut outcomes = Vec::with_capacity(videos.len());
        for video in videos {
            if cancel.is_cancelled() {
                break;
            }
            outcomes.push(self.process_video(video, cancel).await);
        }
        outcomes
    }

    /// Segment one video and queue its status update.
    pub async fn process_video(&self, mut video: Video, cancel: &CancellationToken) -> Outcome {
        let video_id = video.id;
        let location = video.location.clone();
        tracing::info!(video_id = %video_id, location = %location, "Processing video");

        let outcome = match self.segment_video(&video, cancel).await {
            Ok(meta) => match video.complete(meta) {
                Ok(()) => {
                    tracing::info!(video_id = %video_id, location = %location, "Video ready");
                    Outcome::Ready
                }
                Err(e) => {
                    tracing::error!(video_id = %video_id, location = %location, error = %e, "Produced unusable playback meta");
                    self.mark_failed(&mut video);
                    Outcome::Failed
                }
            },
            Err(e) if e.is_cancelled() => {
                tracing::info!(video_id = %video_id, location = %location, "Processing cancelled");
                return Outcome::Cancelled;
            }
            Err(e) => {
                tracing::error!(video_id = %video_id, location = %location, error = %e, "Processing failed");
                self.mark_failed(&mut video);
                Outcome::Failed
            }
        };

        let upload_info = video.upload_info.clone();
        if let Err(e) = self.notifier.send(Event::update_status(video)).await {
            tracing::warn!(video_id = %video_id, error = %e, "Failed to queue status update");
        }

        if outcome == Outcome::Ready && self.purge_uploads {
            self.purge_upload(&video_id.to_string(), &location, upload_info.as_ref())
                .await;
        }
        outcome
    }

    fn mark_failed(&self, video: &mut Video) {
        // `error` is reachable from every status.
        if video.transition(Status::Error).is_err() {
            video.status = Status::Error;
            video.playback_meta = None;
        }
    }

    async fn segment_video(&self, video: &Video, cancel: &CancellationToken) -> Result<Meta> {
        if video.location.is_empty() {
            return Err(Error::EmptyLocation(video.id.to_string()));
        }

        let handle = Handle::current();
        let store = Arc::clone(&self.store);
        let upload_prefix = self.upload_prefix.clone();
        let output_dir = paths::asset_dir(&self.watch_prefix, &video.location);
        let segment_duration = self.segment_duration;
        let cancel = cancel.clone();
        let video = video.clone();

        tokio::task::spawn_blocking(move || {
            let mut reader = open_upload(&handle, Arc::clone(&store), &upload_prefix, &video)?;
            tracing::debug!(
                video_id = %video.id,
                size = reader.total_size(),
                parts = reader.part_count(),
                "Opened upload"
            );

            let result = (|| -> Result<Meta> {
                let file = Mp4File::parse(&mut reader, ParseMode::Lazy)?;
                let mut sink = StoreSink::new(handle.clone(), store, output_dir, cancel);
                let output = Segmenter::new(segment_duration).segment(
                    &file,
                    Some(&mut reader),
                    &mut sink,
                )?;
                tracing::debug!(
                    video_id = %video.id,
                    objects = sink.written().len(),
                    "Stored segments"
                );
                Ok(output.meta(segment_duration))
            })();

            reader.close();
            tracing::trace!(video_id = %video.id, "Closed upload reader");
            result
        })
        .await
        .map_err(|e| Error::internal(format!("segmentation task failed: {e}")))?
    }

    async fn purge_upload(
        &self,
        video_id: &str,
        location: &str,
        upload_info: Option<&vidi_common::UploadInfo>,
    ) {
        let names: Vec<String> = match upload_info {
            Some(info) if !info.parts.is_empty() => info
                .parts
                .iter()
                .map(|part| paths::part_name(&self.upload_prefix, location, part.num))
                .collect(),
            _ => vec![paths::artifact_name(&self.upload_prefix, location)],
        };

        for name in names {
            if let Err(e) = self.store.delete(&name).await {
                tracing::warn!(video_id = %video_id, object = %name, error = %e, "Failed to purge upload");
            }
        }
        tracing::debug!(video_id = %video_id, location = %location, "Purged upload");
    }
}
