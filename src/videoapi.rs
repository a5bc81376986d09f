//! Client for the video API, the owner of video records.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use vidi_common::{Error, Meta, Result, Status, Video, VideoId};

use crate::config::VideoApiConfig;

/// Operations the processing core needs from the video API.
#[async_trait::async_trait]
pub trait VideoApi: Send + Sync {
    /// Videos waiting for processing (status `uploaded`).
    async fn uploaded_videos(&self) -> Result<Vec<Video>>;

    /// Set the status; `meta` travels with a `ready` status.
    async fn update_status(&self, id: &VideoId, status: Status, meta: Option<&Meta>) -> Result<()>;

    async fn update_location(&self, id: &VideoId, location: &str) -> Result<()>;

    /// Set status and location together.
    async fn update_video(&self, id: &VideoId, status: Status, location: &str) -> Result<()>;
}

/// JSON-over-HTTP video API client.
pub struct HttpVideoApi {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Serialize)]
struct StatusUpdate<'a> {
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    playback_meta: Option<&'a Meta>,
}

#[derive(Serialize)]
struct LocationUpdate<'a> {
    location: &'a str,
}

#[derive(Serialize)]
struct VideoUpdate<'a> {
    status: Status,
    location: &'a str,
}

impl HttpVideoApi {
    pub fn new(config: &VideoApiConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send with the bearer token; non-2xx becomes an error.
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::internal(format!("{what}: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::not_found("video api resource", what));
        }
        Err(Error::internal(format!("{what}: {status}: {body}")))
    }
}

#[async_trait::async_trait]
impl VideoApi for HttpVideoApi {
    async fn uploaded_videos(&self) -> Result<Vec<Video>> {
        let request = self
            .client
            .get(self.url("/videos"))
            .query(&[("status", Status::Uploaded.as_str())]);
        self.send(request, "list uploaded videos")
            .await?
            .json()
            .await
            .map_err(|e| Error::internal(format!("decode uploaded videos: {e}")))
    }

    async fn update_status(&self, id: &VideoId, status: Status, meta: Option<&Meta>) -> Result<()> {
        let body = StatusUpdate {
            status,
            playback_meta: meta,
        };
        let request = self
            .client
            .put(self.url(&format!("/videos/{id}/status")))
            .json(&body);
        self.send(request, &format!("update status of {id}")).await?;
        Ok(())
    }

    async fn update_location(&self, id: &VideoId, location: &str) -> Result<()> {
        if location.is_empty() {
            return Err(Error::EmptyLocation(id.to_string()));
        }
        let request = self
            .client
            .put(self.url(&format!("/videos/{id}/location")))
            .json(&LocationUpdate { location });
        self.send(request, &format!("update location of {id}")).await?;
        Ok(())
    }

    async fn update_video(&self, id: &VideoId, status: Status, location: &str) -> Result<()> {
        if location.is_empty() {
            return Err(Error::EmptyLocation(id.to_string()));
        }
        let request = self
            .client
            .patch(self.url(&format!("/videos/{id}")))
            .json(&VideoUpdate { status, location });
        self.send(request, &format!("update video {id}")).await?;
        Ok(())
    }
}
