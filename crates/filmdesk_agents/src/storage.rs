//! Object storage for uploaded scripts.
//!
//! The client is built from an explicit [`StorageConfig`] and injected into the
//! handlers that need it. A half-configured store is rejected up front rather
//! than at first use.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage is misconfigured: {0}")]
    Config(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage request failed ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Storage transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Connection settings for a Supabase-compatible storage endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub url: String,
    pub bucket: String,
    pub key: String,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("url", &self.url)
            .field("bucket", &self.bucket)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl StorageConfig {
    /// Build a config from optional parts.
    ///
    /// `Ok(None)` when nothing is set; an error when only some parts are.
    pub fn resolve(
        url: Option<String>,
        bucket: Option<String>,
        key: Option<String>,
    ) -> Result<Option<Self>, StorageError> {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        match (clean(url), clean(bucket), clean(key)) {
            (None, None, None) => Ok(None),
            (Some(url), Some(bucket), Some(key)) => {
                let config = Self { url, bucket, key };
                config.validate()?;
                Ok(Some(config))
            }
            (url, bucket, key) => {
                let missing: Vec<&str> = [
                    ("url", url.is_none()),
                    ("bucket", bucket.is_none()),
                    ("key", key.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(StorageError::Config(format!("missing {}", missing.join(", "))))
            }
        }
    }

    pub fn validate(&self) -> Result<(), StorageError> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(StorageError::Config(format!(
                "url must start with http:// or https:// (got '{}')",
                self.url
            )));
        }
        if self.bucket.contains('/') {
            return Err(StorageError::Config("bucket must not contain '/'".into()));
        }
        if self.key.is_empty() {
            return Err(StorageError::Config("key is empty".into()));
        }
        Ok(())
    }

    fn base(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

/// Script file storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    fn public_url(&self, path: &str) -> String;

    /// Time-limited URL for a private object.
    async fn signed_url(&self, path: &str, expires_in: Duration) -> Result<String, StorageError>;
}

/// REST client for Supabase storage (`/storage/v1/object/...`).
#[derive(Debug, Clone)]
pub struct SupabaseStorage {
    config: StorageConfig,
    client: Client,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl SupabaseStorage {
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        config.validate()?;
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { config, client })
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.base(),
            self.config.bucket,
            path.trim_start_matches('/')
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.config.key)
            .header("apikey", &self.config.key)
    }

    async fn check(
        path: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(path.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        debug!(path, size = bytes.len(), "Uploading object");
        let response = self
            .authorized(self.client.post(self.object_url(path)))
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        Self::check(path, response).await?;
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        debug!(path, "Downloading object");
        let response = self
            .authorized(self.client.get(self.object_url(path)))
            .send()
            .await?;
        let response = Self::check(path, response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let response = self
            .authorized(self.client.delete(self.object_url(path)))
            .send()
            .await?;
        Self::check(path, response).await?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.base(),
            self.config.bucket,
            path.trim_start_matches('/')
        )
    }

    async fn signed_url(&self, path: &str, expires_in: Duration) -> Result<String, StorageError> {
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.config.base(),
            self.config.bucket,
            path.trim_start_matches('/')
        );
        let response = self
            .authorized(self.client.post(url))
            .json(&serde_json::json!({ "expiresIn": expires_in.as_secs() }))
            .send()
            .await?;
        let signed: SignedUrlResponse = Self::check(path, response).await?.json().await?;
        // The service answers with a path relative to /storage/v1.
        Ok(format!("{}/storage/v1{}", self.config.base(), signed.signed_url))
    }
}
