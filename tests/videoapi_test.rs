//! HTTP video API client against a mock server.

mod common;

use common::{uploaded_video, TestHarness, TOKEN};
use serde_json::json;
use vidi::videoapi::{HttpVideoApi, VideoApi};
use vidi_common::{Codec, Error, Meta, SegmentInfo, Status, Track, INIT_SUFFIX, VIDEO_MIME};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

fn meta() -> Meta {
    Meta {
        tracks: vec![Track {
            name: "vide1".into(),
            mime_type: VIDEO_MIME.into(),
            codec: Codec {
                profile: "avc1.64001f".into(),
                sample_rate: None,
            },
            segment: SegmentInfo {
                init: INIT_SUFFIX.into(),
                start_number: 1,
                duration: 46080,
                timescale: 15360,
            },
        }],
        duration: 10,
    }
}

#[tokio::test]
async fn lists_uploaded_videos_with_bearer_token() {
    let harness = TestHarness::new().await;
    let videos = vec![uploaded_video("a"), uploaded_video("b")];
    harness.mock_uploaded(&videos).await;

    let listed = harness.api().uploaded_videos().await.unwrap();
    assert_eq!(listed, videos);
}

#[tokio::test]
async fn status_update_carries_meta() {
    let harness = TestHarness::new().await;
    let video = uploaded_video("a");
    let meta = meta();

    Mock::given(method("PUT"))
        .and(path(format!("/videos/{}/status", video.id)))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .and(body_json(json!({
            "status": "ready",
            "playback_meta": serde_json::to_value(&meta).unwrap(),
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&harness.server)
        .await;

    harness
        .api()
        .update_status(&video.id, Status::Ready, Some(&meta))
        .await
        .unwrap();
}

#[tokio::test]
async fn error_status_has_no_meta() {
    let harness = TestHarness::new().await;
    let video = uploaded_video("a");

    Mock::given(method("PUT"))
        .and(path(format!("/videos/{}/status", video.id)))
        .and(body_json(json!({ "status": "error" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&harness.server)
        .await;

    harness
        .api()
        .update_status(&video.id, Status::Error, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn location_update() {
    let harness = TestHarness::new().await;
    let video = uploaded_video("a");

    Mock::given(method("PUT"))
        .and(path(format!("/videos/{}/location", video.id)))
        .and(body_json(json!({ "location": "new-loc" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&harness.server)
        .await;

    harness
        .api()
        .update_location(&video.id, "new-loc")
        .await
        .unwrap();
}

#[tokio::test]
async fn empty_location_is_rejected_locally() {
    let harness = TestHarness::new().await;
    let video = uploaded_video("a");
    let api = harness.api();

    let err = api.update_location(&video.id, "").await.unwrap_err();
    assert!(matches!(err, Error::EmptyLocation(_)), "{err}");
    let err = api.update_video(&video.id, Status::Uploading, "").await.unwrap_err();
    assert!(matches!(err, Error::EmptyLocation(_)), "{err}");

    let requests = harness.server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn video_update_patches_status_and_location() {
    let harness = TestHarness::new().await;
    let video = uploaded_video("a");

    Mock::given(method("PATCH"))
        .and(path(format!("/videos/{}", video.id)))
        .and(body_json(json!({ "status": "uploading", "location": "loc" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&harness.server)
        .await;

    harness
        .api()
        .update_video(&video.id, Status::Uploading, "loc")
        .await
        .unwrap();
}

#[tokio::test]
async fn server_error_carries_status_and_body() {
    let harness = TestHarness::new().await;
    let video = uploaded_video("a");

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
        .mount(&harness.server)
        .await;

    let err = harness
        .api()
        .update_status(&video.id, Status::Error, None)
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("500"), "{message}");
    assert!(message.contains("database down"), "{message}");
}

#[tokio::test]
async fn unknown_video_is_not_found() {
    let harness = TestHarness::new().await;
    let video = uploaded_video("a");

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&harness.server)
        .await;

    let err = harness
        .api()
        .update_location(&video.id, "loc")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "{err}");
}

#[tokio::test]
async fn slow_server_times_out() {
    let mut harness = TestHarness::new().await;
    harness.config.videoapi.timeout_secs = 1;

    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(Vec::<serde_json::Value>::new())
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&harness.server)
        .await;

    let api = HttpVideoApi::new(&harness.config.videoapi);
    assert!(api.uploaded_videos().await.is_err());
}
