//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which pairs an in-memory box store with a
//! wiremock video API and a config pointing at it, plus helpers to stage
//! uploads the way the upload service lays them out.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use vidi::config::Config;
use vidi::notificator::{self, Notificator};
use vidi::processor::Processor;
use vidi::storage::{paths, BoxReader, BoxStore, MemoryStore};
use vidi::videoapi::{HttpVideoApi, VideoApi};
use vidi_common::{Error, Part, PartStatus, Result, Status, UploadInfo, UserId, Video, VideoId};
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "service-token";
pub const UPLOAD_PREFIX: &str = "upload";
pub const WATCH_PREFIX: &str = "watch";

/// Memory store plus a mocked video API.
pub struct TestHarness {
    pub store: MemoryStore,
    pub server: MockServer,
    pub config: Config,
}

impl TestHarness {
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        let mut config = Config::default();
        config.videoapi.endpoint = server.uri();
        config.videoapi.token = TOKEN.to_string();
        config.s3.prefix.upload = UPLOAD_PREFIX.to_string();
        config.s3.prefix.watch = WATCH_PREFIX.to_string();

        Self {
            store: MemoryStore::new(),
            server,
            config,
        }
    }

    pub fn api(&self) -> Arc<dyn VideoApi> {
        Arc::new(HttpVideoApi::new(&self.config.videoapi))
    }

    /// Processor and notificator over the harness store.
    pub fn processor(&self) -> (Processor, Notificator) {
        self.processor_with_store(Arc::new(self.store.clone()))
    }

    pub fn processor_with_store(&self, store: Arc<dyn BoxStore>) -> (Processor, Notificator) {
        let api = self.api();
        let (sender, notificator) = notificator::channel(Arc::clone(&api));
        (Processor::new(&self.config, api, store, sender), notificator)
    }

    /// Serve `videos` from the uploaded-videos listing.
    pub async fn mock_uploaded(&self, videos: &[Video]) {
        Mock::given(method("GET"))
            .and(path("/videos"))
            .and(query_param("status", "uploaded"))
            .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(videos))
            .mount(&self.server)
            .await;
    }

    /// Accept every status update.
    pub async fn mock_status_updates(&self) {
        Mock::given(method("PUT"))
            .and(path_regex(r"^/videos/[^/]+/status$"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&self.server)
            .await;
    }

    /// Status update bodies received so far, keyed by video id, in order.
    pub async fn status_updates(&self) -> Vec<(String, serde_json::Value)> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == "PUT" && r.url.path().ends_with("/status"))
            .map(|r| {
                let id = r
                    .url
                    .path()
                    .trim_start_matches("/videos/")
                    .trim_end_matches("/status")
                    .to_string();
                let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
                (id, body)
            })
            .collect()
    }

    /// Objects written under a video's output directory.
    pub fn outputs(&self, video: &Video) -> Vec<String> {
        let dir = paths::asset_dir(WATCH_PREFIX, &video.location);
        self.store.names(&format!("{dir}/"))
    }

    /// Stage `bytes` as a legacy single-file upload.
    pub fn upload_artifact(&self, video: &Video, bytes: Vec<u8>) {
        self.store
            .insert(paths::artifact_name(UPLOAD_PREFIX, &video.location), bytes);
    }

    /// Stage `bytes` as numbered parts and record the layout on `video`.
    pub fn upload_parts(&self, video: &mut Video, bytes: &[u8], part_size: u64) {
        video.upload_info = Some(stage_parts(
            &self.store,
            UPLOAD_PREFIX,
            &video.location,
            bytes,
            part_size,
        ));
    }
}

/// Write `bytes` as `<prefix>/<location>/<n>` parts.
pub fn stage_parts(
    store: &MemoryStore,
    prefix: &str,
    location: &str,
    bytes: &[u8],
    part_size: u64,
) -> UploadInfo {
    let parts = bytes
        .chunks(part_size as usize)
        .enumerate()
        .map(|(num, chunk)| {
            let num = num as u32;
            store.insert(paths::part_name(prefix, location, num), chunk.to_vec());
            Part {
                num,
                size: chunk.len() as u64,
                checksum: Part::checksum_of(chunk),
                status: PartStatus::Ok,
            }
        })
        .collect();

    UploadInfo {
        url: String::new(),
        size: bytes.len() as u64,
        part_size,
        parts,
    }
}

/// A video in status `uploaded` at `location`.
pub fn uploaded_video(location: &str) -> Video {
    let mut rng = rand::thread_rng();
    let mut video = Video::new(VideoId::generate(&mut rng), UserId::generate(&mut rng));
    video.location = location.to_string();
    video.status = Status::Uploaded;
    video
}

/// Store whose puts under `fail_prefix` transfer one byte short.
#[derive(Clone)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub fail_prefix: String,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore, fail_prefix: impl Into<String>) -> Self {
        Self {
            inner,
            fail_prefix: fail_prefix.into(),
        }
    }
}

#[async_trait]
impl BoxStore for FaultyStore {
    async fn put(&self, name: &str, reader: BoxReader, size: u64) -> Result<()> {
        if !name.starts_with(&self.fail_prefix) {
            return self.inner.put(name, reader, size).await;
        }
        let mut data = Vec::new();
        let mut reader = reader;
        reader.read_to_end(&mut data).await?;
        data.pop();
        Err(Error::storage(format!(
            "put {name}: transferred {} bytes, expected {size}",
            data.len()
        )))
    }

    async fn get(&self, name: &str) -> Result<(BoxReader, u64)> {
        self.inner.get(name).await
    }

    async fn get_range(&self, name: &str, offset: u64) -> Result<BoxReader> {
        self.inner.get_range(name, offset).await
    }

    async fn size(&self, name: &str) -> Result<u64> {
        self.inner.size(name).await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.inner.delete(name).await
    }
}
