//! Blob storage client for template images (Supabase Storage REST API).
//!
//! Objects are uploaded with upsert semantics and served from the bucket's
//! public URL. Removal derives object paths back from those public URLs.

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::StorageConfig;

/// Errors that can occur when talking to the blob store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// No bucket name configured.
    #[error("storage bucket is not configured")]
    BucketNotConfigured,

    /// Invalid client configuration.
    #[error("invalid storage configuration: {0}")]
    Config(String),
}

/// A file to upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Supabase Storage client.
#[derive(Clone)]
pub struct StorageClient {
    client: reqwest::Client,
    base_url: String,
    bucket: Option<String>,
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl StorageClient {
    /// Create a new storage client.
    ///
    /// # Errors
    ///
    /// Returns error if the service key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let key = config.service_key.expose_secret();
        let mut headers = HeaderMap::new();

        let mut auth = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| StorageError::Config(format!("invalid service key: {e}")))?;
        auth.set_sensitive(true);
        headers.insert("Authorization", auth);

        let mut api_key = HeaderValue::from_str(key)
            .map_err(|e| StorageError::Config(format!("invalid service key: {e}")))?;
        api_key.set_sensitive(true);
        headers.insert("apikey", api_key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone().filter(|b| !b.is_empty()),
        })
    }

    /// Whether a bucket is configured.
    #[must_use]
    pub const fn has_bucket(&self) -> bool {
        self.bucket.is_some()
    }

    fn bucket(&self) -> Result<&str, StorageError> {
        self.bucket
            .as_deref()
            .ok_or(StorageError::BucketNotConfigured)
    }

    /// Public URL of an object in the bucket.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BucketNotConfigured` without a bucket.
    pub fn public_url(&self, path: &str) -> Result<String, StorageError> {
        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket()?,
            encode_path(path)
        ))
    }

    /// Object path for a public URL of this bucket, if it is one.
    #[must_use]
    pub fn object_path(&self, public_url: &str) -> Option<String> {
        let bucket = self.bucket.as_deref()?;
        let prefix = format!("{}/storage/v1/object/public/{bucket}/", self.base_url);
        let path = public_url.strip_prefix(&prefix)?;
        let path = path.split(['?', '#']).next().unwrap_or(path);
        if path.is_empty() {
            return None;
        }
        urlencoding::decode(path).ok().map(|p| p.into_owned())
    }

    /// Upload (or overwrite) an object and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BucketNotConfigured` without a bucket, or an
    /// HTTP/API error if the upload fails.
    #[tracing::instrument(skip(self, file), fields(size = file.data.len()))]
    pub async fn upload(&self, path: &str, file: UploadFile) -> Result<String, StorageError> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket()?,
            encode_path(path)
        );
        let content_type = file
            .content_type
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let response = self
            .client
            .post(&url)
            .header("x-upsert", "true")
            .header("Content-Type", content_type)
            .body(file.data)
            .send()
            .await?;
        check_status(response).await?;

        tracing::debug!(path = %path, "Object uploaded");
        self.public_url(path)
    }

    /// Remove objects by path.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BucketNotConfigured` without a bucket, or an
    /// HTTP/API error if the removal fails.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, paths: &[String]) -> Result<(), StorageError> {
        if paths.is_empty() {
            return Ok(());
        }
        let url = format!("{}/storage/v1/object/{}", self.base_url, self.bucket()?);

        let response = self
            .client
            .delete(&url)
            .json(&serde_json::json!({ "prefixes": paths }))
            .send()
            .await?;
        check_status(response).await
    }
}

/// Object name for an uploaded template image.
#[must_use]
pub fn template_object_name(kind: &str, millis: i64, original_name: &str) -> String {
    let name: String = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name)
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    format!("{kind}-{millis}-{name}")
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

async fn check_status(response: reqwest::Response) -> Result<(), StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let message = response.text().await.unwrap_or_default();
    Err(StorageError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn client(bucket: Option<&str>) -> StorageClient {
        StorageClient::new(&StorageConfig {
            url: "https://proj.supabase.co/".to_string(),
            service_key: SecretString::from("service-key"),
            bucket: bucket.map(String::from),
        })
        .unwrap()
    }

    #[test]
    fn test_public_url_and_object_path() {
        let storage = client(Some("cards"));
        let url = storage.public_url("background-1-my card.png").unwrap();
        assert_eq!(
            url,
            "https://proj.supabase.co/storage/v1/object/public/cards/background-1-my%20card.png"
        );
        assert_eq!(
            storage.object_path(&url).as_deref(),
            Some("background-1-my card.png")
        );
    }

    #[test]
    fn test_object_path_rejects_foreign_urls() {
        let storage = client(Some("cards"));
        assert!(storage.object_path("https://elsewhere.test/a.png").is_none());
        assert!(
            storage
                .object_path("https://proj.supabase.co/storage/v1/object/public/other/a.png")
                .is_none()
        );
    }

    #[test]
    fn test_missing_bucket() {
        let storage = client(None);
        assert!(!storage.has_bucket());
        assert!(matches!(
            storage.public_url("a.png"),
            Err(StorageError::BucketNotConfigured)
        ));
        assert!(storage.object_path("anything").is_none());
    }

    #[test]
    fn test_template_object_name() {
        assert_eq!(
            template_object_name("sticker", 1_700_000_000_000, "dir/gold foil.png"),
            "sticker-1700000000000-gold_foil.png"
        );
    }
}
