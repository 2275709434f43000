use std::time::Duration;

use bytes::{Bytes, BytesMut};
use reqwest::{header::CONTENT_TYPE, Client};
use tracing::{debug, info};
use url::Url;

use crate::config::FetchConfig;
use crate::documents::{extension_for_mime, Document};
use crate::types::{AppError, AppResult};

/// Downloads documents (and images referenced by them) in a single attempt.
#[derive(Clone)]
pub struct DocumentFetcher {
    client: Client,
    max_bytes: usize,
}

impl DocumentFetcher {
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            max_bytes: config.max_document_bytes,
        })
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn fetch(&self, url: &str) -> AppResult<Document> {
        let parsed = Url::parse(url)
            .map_err(|e| AppError::Fetch(format!("invalid URL {}: {}", url, e)))?;

        let (bytes, content_type) = self.download(&parsed).await?;
        let file_name = file_name_from_url(&parsed);
        let extension = infer_extension(&file_name, content_type.as_deref());

        info!(
            "Downloaded {} ({} bytes, extension {:?})",
            file_name,
            bytes.len(),
            extension
        );

        Ok(Document {
            url: parsed,
            file_name,
            extension,
            bytes,
        })
    }

    /// GET `url` and return its body with the response content type.
    pub async fn download(&self, url: &Url) -> AppResult<(Bytes, Option<String>)> {
        debug!("Fetching {}", url);

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AppError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Fetch(format!("{} returned {}", url, status)));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(self.too_large(url, length as usize));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        // Chunked bodies carry no length up front, so the cap is checked as data arrives.
        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AppError::Fetch(e.to_string()))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(AppError::Fetch(format!(
                    "{} exceeds the {} byte limit",
                    url, self.max_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        Ok((body.freeze(), content_type))
    }

    fn too_large(&self, url: &Url, size: usize) -> AppError {
        AppError::Fetch(format!(
            "{} is {} bytes, above the {} byte limit",
            url, size, self.max_bytes
        ))
    }
}

/// Last non-empty path segment of the URL, ignoring the query string.
pub fn file_name_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or_default()
        .to_string()
}

/// Lower-cased extension with its leading dot, falling back to the content type.
pub fn infer_extension(file_name: &str, content_type: Option<&str>) -> String {
    let from_name = std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()));

    match from_name {
        Some(ext) => ext,
        None => content_type
            .and_then(extension_for_mime)
            .unwrap_or_default()
            .to_string(),
    }
}
