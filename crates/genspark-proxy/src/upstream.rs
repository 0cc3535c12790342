//! Genspark HTTP client.
//!
//! Request builders are kept separate from the `send` helpers so the exact
//! request shapes (paths, headers, timeouts) can be inspected without I/O.
//! Every call is made once; nothing here retries.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, ORIGIN, REFERER};
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::attachment::AttachmentTransport;
use crate::config::ProxyConfig;
use crate::error::ProxyError;

pub const ASK_PATH: &str = "/api/copilot/ask";
pub const DELETE_PATH: &str = "/api/project/delete";
pub const UPLOAD_SLOT_PATH: &str = "/api/get_upload_personal_image_url";

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Pre-signed upload target returned by the upload-slot endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadSlot {
    pub upload_image_url: String,
    pub private_storage_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadSlotEnvelope {
    data: UploadSlot,
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    base_url: String,
    ask_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(config: &ProxyConfig) -> Result<Self, ProxyError> {
        let http = Client::builder().build()?;
        Ok(Self::with_client(
            http,
            config.base_url_trimmed(),
            Duration::from_secs(config.request_timeout_secs),
        ))
    }

    /// Use a caller-provided transport.
    pub fn with_client(http: Client, base_url: impl Into<String>, ask_timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ask_timeout,
        }
    }

    /// Common shape of the cookie-authenticated API calls.
    fn session_request(
        &self,
        method: Method,
        path: &str,
        accept: &str,
        cookie: &SecretString,
    ) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .timeout(self.ask_timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, accept)
            .header(ORIGIN, &self.base_url)
            .header(REFERER, format!("{}/", self.base_url))
            .header(COOKIE, cookie.expose_secret())
    }

    pub fn ask_request(&self, cookie: &SecretString, body: Vec<u8>, stream: bool) -> RequestBuilder {
        let accept = if stream {
            "text/event-stream"
        } else {
            "application/json"
        };
        self.session_request(Method::POST, ASK_PATH, accept, cookie)
            .body(body)
    }

    pub fn delete_request(&self, cookie: &SecretString, project_id: &str) -> RequestBuilder {
        self.session_request(Method::GET, DELETE_PATH, "application/json", cookie)
            .query(&[("project_id", project_id)])
    }

    pub fn upload_slot_request(&self, cookie: &SecretString) -> RequestBuilder {
        self.session_request(Method::GET, UPLOAD_SLOT_PATH, "*/*", cookie)
    }

    pub fn upload_request(&self, slot: &UploadSlot, bytes: Bytes) -> RequestBuilder {
        self.http
            .put(&slot.upload_image_url)
            .timeout(UPLOAD_TIMEOUT)
            .header(ACCEPT, "*/*")
            .header("x-ms-blob-type", "BlockBlob")
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, bytes.len())
            .header(ORIGIN, &self.base_url)
            .body(bytes)
    }

    /// Send the ask payload. The returned response still carries the
    /// unread SSE body.
    pub async fn ask(
        &self,
        cookie: &SecretString,
        body: Vec<u8>,
        stream: bool,
    ) -> Result<Response, ProxyError> {
        let response = self.ask_request(cookie, body, stream).send().await?;
        ensure_success(response).await
    }

    pub async fn delete_project(
        &self,
        cookie: &SecretString,
        project_id: &str,
    ) -> Result<(), ProxyError> {
        let response = self.delete_request(cookie, project_id).send().await?;
        ensure_success(response).await?;
        debug!(project_id, "deleted upstream project");
        Ok(())
    }
}

#[async_trait]
impl AttachmentTransport for UpstreamClient {
    async fn fetch(&self, url: &str) -> Result<Bytes, ProxyError> {
        let response = ensure_success(self.http.get(url).send().await?).await?;
        Ok(response.bytes().await?)
    }

    async fn request_upload_slot(&self, cookie: &SecretString) -> Result<UploadSlot, ProxyError> {
        let response = ensure_success(self.upload_slot_request(cookie).send().await?).await?;
        let text = response.text().await?;
        let envelope: UploadSlotEnvelope = serde_json::from_str(&text)
            .map_err(|e| ProxyError::InvalidResponse(format!("upload slot: {}", e)))?;
        Ok(envelope.data)
    }

    async fn upload(&self, slot: &UploadSlot, bytes: Bytes) -> Result<(), ProxyError> {
        let response = self.upload_request(slot, bytes).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

async fn ensure_success(response: Response) -> Result<Response, ProxyError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(ProxyError::UpstreamStatus { status, body })
}
