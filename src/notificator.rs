//! Ordered delivery of video record updates to the video API.
//!
//! Producers enqueue [`Event`]s through a [`NotificationSender`]; a single
//! [`Notificator`] task applies them in FIFO order. On cancellation the
//! queue is closed and whatever is still buffered gets delivered before
//! `run` returns, so updates emitted during shutdown are not lost.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vidi_common::{Error, Result, Video};

use crate::videoapi::VideoApi;

/// Events buffered before `send` starts waiting.
pub const QUEUE_CAPACITY: usize = 100;

/// Which fields of the video record to push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    UpdateStatus,
    UpdateLocation,
    UpdateStatusAndLocation,
}

/// An update for one video, carrying the record as it should now read.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub video: Video,
}

impl Event {
    pub fn update_status(video: Video) -> Self {
        Self {
            kind: EventKind::UpdateStatus,
            video,
        }
    }

    pub fn update_location(video: Video) -> Self {
        Self {
            kind: EventKind::UpdateLocation,
            video,
        }
    }

    pub fn update_status_and_location(video: Video) -> Self {
        Self {
            kind: EventKind::UpdateStatusAndLocation,
            video,
        }
    }
}

/// Producer half of the queue.
#[derive(Clone)]
pub struct NotificationSender {
    tx: mpsc::Sender<Event>,
}

impl NotificationSender {
    /// Enqueue `event`, waiting while the queue is full.
    pub async fn send(&self, event: Event) -> Result<()> {
        self.tx.send(event).await.map_err(|e| {
            Error::internal(format!(
                "notification queue closed, dropped update for {}",
                e.0.video.id
            ))
        })
    }
}

/// Consumer half of the queue.
pub struct Notificator {
    api: Arc<dyn VideoApi>,
    rx: mpsc::Receiver<Event>,
}

/// Create a queue delivering to `api`.
pub fn channel(api: Arc<dyn VideoApi>) -> (NotificationSender, Notificator) {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    (NotificationSender { tx }, Notificator { api, rx })
}

impl Notificator {
    /// Deliver events until cancelled or every sender is gone.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!("Notificator started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.rx.recv() => match event {
                    Some(event) => self.deliver(event).await,
                    None => {
                        tracing::info!("Notification queue closed");
                        return;
                    }
                },
            }
        }

        self.rx.close();
        let mut drained = 0usize;
        while let Some(event) = self.rx.recv().await {
            self.deliver(event).await;
            drained += 1;
        }
        tracing::info!(drained, "Notificator stopped");
    }

    async fn deliver(&self, event: Event) {
        let video = &event.video;
        let result = match event.kind {
            EventKind::UpdateStatus => {
                self.api
                    .update_status(&video.id, video.status, video.playback_meta.as_ref())
                    .await
            }
            EventKind::UpdateLocation => self.api.update_location(&video.id, &video.location).await,
            EventKind::UpdateStatusAndLocation => {
                self.api
                    .update_video(&video.id, video.status, &video.location)
                    .await
            }
        };

        match result {
            Ok(()) => tracing::debug!(
                video_id = %video.id,
                kind = ?event.kind,
                status = %video.status,
                "Delivered video update"
            ),
            Err(e) => tracing::warn!(
                video_id = %video.id,
                kind = ?event.kind,
                error = %e,
                "Failed to deliver video update"
            ),
        }
    }
}
