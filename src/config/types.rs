use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub videoapi: VideoApiConfig,

    #[serde(default)]
    pub s3: S3Config,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub processor: ProcessorConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VideoApiConfig {
    /// Base URL of the video API
    #[serde(default = "default_videoapi_endpoint")]
    pub endpoint: String,

    /// Bearer token carrying the service role
    #[serde(default)]
    pub token: String,

    /// Per-request deadline in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_videoapi_endpoint() -> String {
    "http://localhost:8081".to_string()
}
fn default_timeout() -> u64 {
    5
}

impl Default for VideoApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_videoapi_endpoint(),
            token: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

impl VideoApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct S3Config {
    /// Host (and port) of the S3-compatible endpoint
    #[serde(default = "default_s3_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub access_key: String,

    #[serde(default)]
    pub secret_key: String,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Use https towards the endpoint
    #[serde(default)]
    pub ssl: bool,

    #[serde(default)]
    pub prefix: PrefixConfig,
}

fn default_s3_endpoint() -> String {
    "localhost:9000".to_string()
}
fn default_bucket() -> String {
    "vidi".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: default_s3_endpoint(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket: default_bucket(),
            region: default_region(),
            ssl: false,
            prefix: PrefixConfig::default(),
        }
    }
}

impl S3Config {
    /// Endpoint URL with scheme, as the SDK expects it.
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else if self.ssl {
            format!("https://{}", self.endpoint)
        } else {
            format!("http://{}", self.endpoint)
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrefixConfig {
    /// Where uploaded parts live
    #[serde(default = "default_upload_prefix")]
    pub upload: String,

    /// Where segments are written
    #[serde(default = "default_watch_prefix")]
    pub watch: String,
}

fn default_upload_prefix() -> String {
    "upload".to_string()
}
fn default_watch_prefix() -> String {
    "watch".to_string()
}

impl Default for PrefixConfig {
    fn default() -> Self {
        Self {
            upload: default_upload_prefix(),
            watch: default_watch_prefix(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    S3,
    Fs,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory of the fs backend
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root: default_storage_root(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessorConfig {
    /// Target segment length in seconds
    #[serde(default = "default_segment_duration")]
    pub segment_duration: u64,

    /// Seconds between polls for uploaded videos
    #[serde(default = "default_check_period")]
    pub video_check_period: u64,

    /// Delete raw upload parts once a video is ready
    #[serde(default)]
    pub purge_uploads: bool,
}

fn default_segment_duration() -> u64 {
    3
}
fn default_check_period() -> u64 {
    5
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            segment_duration: default_segment_duration(),
            video_check_period: default_check_period(),
            purge_uploads: false,
        }
    }
}

impl ProcessorConfig {
    pub fn segment_duration(&self) -> Duration {
        Duration::from_secs(self.segment_duration)
    }

    pub fn video_check_period(&self) -> Duration {
        Duration::from_secs(self.video_check_period)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    /// Public URL segments are served under; session ids are appended
    #[serde(default = "default_watch_base")]
    pub base_url: String,

    /// Watch session lifetime in seconds
    #[serde(default = "default_watch_ttl")]
    pub session_ttl_secs: u64,
}

fn default_watch_base() -> String {
    "http://localhost:8080/watch".to_string()
}
fn default_watch_ttl() -> u64 {
    vidi_common::WATCH_SESSION_TTL.as_secs()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            base_url: default_watch_base(),
            session_ttl_secs: default_watch_ttl(),
        }
    }
}

impl WatchConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}
