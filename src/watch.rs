//! Watch sessions: short-lived handles under which a ready video's
//! segments and manifest are served.

use rand::RngCore;
use vidi_common::{Error, Result, Session, SessionId, Status, Video};
use vidi_media::Mpd;

use crate::config::WatchConfig;
use crate::session::SessionStore;

/// Open a watch session for a ready video.
pub async fn open_session<R: RngCore + ?Sized>(
    store: &dyn SessionStore,
    rng: &mut R,
    video: &Video,
    config: &WatchConfig,
) -> Result<Session> {
    ensure_playable(video)?;
    let session =
        Session::new(SessionId::generate(rng), video.id).with_location(video.location.clone());
    store.set(session.clone(), config.session_ttl()).await?;
    tracing::debug!(session_id = %session.id, video_id = %video.id, "Opened watch session");
    Ok(session)
}

/// Segment base URL of a session, with a trailing slash.
pub fn session_base_url(config: &WatchConfig, session_id: &SessionId) -> String {
    format!("{}/{}/", config.base_url.trim_end_matches('/'), session_id)
}

/// Render the MPD for `video` as seen through `session_id`.
///
/// The session must exist and belong to `video`; serving refreshes its TTL.
pub async fn manifest_for_session(
    store: &dyn SessionStore,
    session_id: &SessionId,
    video: &Video,
    config: &WatchConfig,
) -> Result<String> {
    let session = store.get(session_id).await?;
    if session.video_id != video.id {
        return Err(Error::not_found("watch session for video", video.id));
    }
    let meta = ensure_playable(video)?;

    store.expire(session_id, config.session_ttl()).await?;

    let base_url = session_base_url(config, session_id);
    Ok(Mpd::new(meta).with_base_url(&base_url).to_string())
}

fn ensure_playable(video: &Video) -> Result<&vidi_common::Meta> {
    if video.status != Status::Ready {
        return Err(Error::IncorrectStatus(format!(
            "video {} is {}, not ready",
            video.id, video.status
        )));
    }
    video
        .playback_meta
        .as_ref()
        .ok_or_else(|| Error::not_found("playback meta", video.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;
    use std::time::Duration;
    use vidi_common::{Codec, Meta, SegmentInfo, Track, UserId, VideoId, INIT_SUFFIX, VIDEO_MIME};

    fn ready_video() -> Video {
        let mut rng = rand::thread_rng();
        let mut video = Video::new(VideoId::generate(&mut rng), UserId::generate(&mut rng));
        video.location = "abc".to_string();
        video.status = Status::Ready;
        video.playback_meta = Some(Meta {
            tracks: vec![Track {
                name: "vide1".to_string(),
                mime_type: VIDEO_MIME.to_string(),
                codec: Codec {
                    profile: "avc1.64001f".to_string(),
                    sample_rate: None,
                },
                segment: SegmentInfo {
                    init: INIT_SUFFIX.to_string(),
                    start_number: 1,
                    duration: 46080,
                    timescale: 15360,
                },
            }],
            duration: 10,
        });
        video
    }

    fn config() -> WatchConfig {
        WatchConfig {
            base_url: "https://cdn.example.com/watch/".to_string(),
            session_ttl_secs: 600,
        }
    }

    #[tokio::test]
    async fn manifest_uses_session_base_url() {
        let store = MemorySessionStore::new();
        let video = ready_video();
        let session = open_session(&store, &mut rand::thread_rng(), &video, &config())
            .await
            .unwrap();

        let mpd = manifest_for_session(&store, &session.id, &video, &config())
            .await
            .unwrap();
        let expected = format!("<BaseURL>https://cdn.example.com/watch/{}/</BaseURL>", session.id);
        assert!(mpd.contains(&expected), "{mpd}");
        assert!(mpd.contains("avc1.64001f"));
    }

    #[tokio::test]
    async fn not_ready_video_has_no_session() {
        let store = MemorySessionStore::new();
        let mut video = ready_video();
        video.status = Status::Processing;

        let err = open_session(&store, &mut rand::thread_rng(), &video, &config())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IncorrectStatus(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn session_of_other_video_is_rejected() {
        let store = MemorySessionStore::new();
        let video = ready_video();
        let other = ready_video();
        let session = open_session(&store, &mut rand::thread_rng(), &other, &config())
            .await
            .unwrap();

        let err = manifest_for_session(&store, &session.id, &video, &config())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn expired_session_is_not_found() {
        let store = MemorySessionStore::new();
        let video = ready_video();
        let session = Session::new(SessionId::generate(&mut rand::thread_rng()), video.id);
        store.set(session.clone(), Duration::ZERO).await.unwrap();

        let err = manifest_for_session(&store, &session.id, &video, &config())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
