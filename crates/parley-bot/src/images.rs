//! Slack image attachments → inline `data:` URIs for the completion API.
//!
//! Private Slack files need the bot token. The direct `url_private` download
//! is tried first; when it does not yield an image, the file is looked up via
//! `files.info` and downloaded from the URL the metadata reports, with the
//! `files-pri/<id>/download` shape as a last resort.

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const SLACK_API_BASE: &str = "https://slack.com/api";
const SLACK_FILES_BASE: &str = "https://files.slack.com";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Extensions accepted after a metadata lookup
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpeg", "jpg", "gif", "webp"];

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Failed to process image: could not extract file id from '{0}'")]
    Extraction(String),

    #[error("Failed to process image: failed to fetch image: {status} {text}")]
    Fetch { status: u16, text: String },

    #[error("Failed to process image: no download URL in file metadata")]
    MissingUrl,

    #[error("Failed to process image: invalid image format: {0}")]
    Format(String),

    #[error("Failed to process image: unsupported image format '{0}'. Supported formats are: png, jpeg, jpg, gif, webp")]
    UnsupportedFormat(String),

    #[error("Failed to process image: {0}")]
    Http(#[from] reqwest::Error),
}

/// Turns an attachment reference into an inline image
#[async_trait]
pub trait ImageResolver: Send + Sync {
    /// Returns `data:<mime>;base64,<payload>`
    async fn resolve(&self, reference: &str) -> Result<String, ImageError>;
}

pub struct SlackImageFetcher {
    http: reqwest::Client,
    bot_token: String,
    api_base: String,
    files_base: String,
}

#[derive(Debug, Deserialize)]
struct FilesInfoResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    file: Option<FileInfo>,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    #[serde(default)]
    url_private: Option<String>,
    #[serde(default)]
    filetype: Option<String>,
}

impl SlackImageFetcher {
    pub fn new(bot_token: impl Into<String>) -> Result<Self, ImageError> {
        let http = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            bot_token: bot_token.into(),
            api_base: SLACK_API_BASE.to_string(),
            files_base: SLACK_FILES_BASE.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_files_base(mut self, files_base: impl Into<String>) -> Self {
        self.files_base = files_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn download(&self, url: &str) -> Result<reqwest::Response, ImageError> {
        Ok(self
            .http
            .get(url)
            .bearer_auth(&self.bot_token)
            .send()
            .await?)
    }

    /// Step 1: the reference itself, accepted only if it is an image
    async fn fetch_direct(&self, reference: &str) -> Option<String> {
        let response = match self.download(reference).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%error, "Direct image download failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "Direct image download rejected");
            return None;
        }

        let content_type = content_type(&response);
        if !is_image(&content_type) {
            tracing::debug!(%content_type, "Direct download did not return an image");
            return None;
        }

        match response.bytes().await {
            Ok(bytes) => Some(encode_data_uri(&content_type, &bytes)),
            Err(error) => {
                tracing::warn!(%error, "Failed to read direct image body");
                None
            }
        }
    }

    /// Step 3: `files.info`; `None` whenever the lookup is unusable
    async fn file_info(&self, file_id: &str) -> Option<FileInfo> {
        let response = self
            .http
            .get(format!("{}/files.info", self.api_base))
            .query(&[("file", file_id)])
            .bearer_auth(&self.bot_token)
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::warn!(status = %response.status(), file_id, "files.info request rejected");
                return None;
            }
            Err(error) => {
                tracing::warn!(%error, file_id, "files.info request failed");
                return None;
            }
        };

        match response.json::<FilesInfoResponse>().await {
            Ok(info) if info.ok => info.file,
            Ok(info) => {
                tracing::warn!(
                    error = info.error.as_deref().unwrap_or("unknown"),
                    file_id,
                    "files.info returned an error"
                );
                None
            }
            Err(error) => {
                tracing::warn!(%error, file_id, "files.info returned an unreadable body");
                None
            }
        }
    }

    /// Fallback when metadata is unavailable
    async fn fetch_by_file_id(&self, file_id: &str) -> Result<String, ImageError> {
        let url = format!("{}/files-pri/{}/download", self.files_base, file_id);
        tracing::info!(%url, "Trying alternative file URL");

        let response = checked(self.download(&url).await?)?;
        let content_type = content_type(&response);
        if !is_image(&content_type) {
            return Err(ImageError::Format(content_type));
        }

        let bytes = response.bytes().await?;
        Ok(encode_data_uri(&content_type, &bytes))
    }

    /// Step 4: download from the URL the metadata reports
    async fn fetch_from_metadata(&self, file: FileInfo) -> Result<String, ImageError> {
        let url = file.url_private.ok_or(ImageError::MissingUrl)?;
        tracing::debug!(%url, "Downloading image from file metadata");

        let response = checked(self.download(&url).await?)?;
        let content_type = content_type(&response);
        if !is_image(&content_type) {
            return Err(ImageError::Format(content_type));
        }

        let extension = image_extension(file.filetype.as_deref(), &url);
        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ImageError::UnsupportedFormat(extension));
        }

        let bytes = response.bytes().await?;
        Ok(encode_data_uri(&content_type, &bytes))
    }
}

#[async_trait]
impl ImageResolver for SlackImageFetcher {
    async fn resolve(&self, reference: &str) -> Result<String, ImageError> {
        if let Some(data_uri) = self.fetch_direct(reference).await {
            tracing::debug!("Fetched image directly");
            return Ok(data_uri);
        }

        let file_id = extract_file_id(reference)
            .ok_or_else(|| ImageError::Extraction(reference.to_string()))?;
        tracing::debug!(%file_id, "Direct fetch failed, looking up file metadata");

        match self.file_info(&file_id).await {
            Some(file) => self.fetch_from_metadata(file).await,
            None => self.fetch_by_file_id(&file_id).await,
        }
    }
}

/// File id from a Slack file URL
///
/// `.../files-pri/<id>/...` and `.../files/<id>/...` yield `<id>`; any other
/// shape yields the last path segment without its query string.
pub fn extract_file_id(reference: &str) -> Option<String> {
    let parts: Vec<&str> = reference.split('/').collect();

    let after = |marker: &str| {
        parts
            .iter()
            .position(|part| *part == marker)
            .map(|idx| parts.get(idx + 1).copied().unwrap_or_default())
    };

    let candidate = after("files-pri")
        .or_else(|| after("files"))
        .or_else(|| parts.last().copied())
        .unwrap_or_default();

    let file_id = strip_query(candidate);
    (!file_id.is_empty()).then(|| file_id.to_string())
}

/// Extension from metadata `filetype` (`png` or `image/png`), else from the URL
pub fn image_extension(filetype: Option<&str>, url: &str) -> String {
    let from_filetype = filetype
        .map(|ft| ft.rsplit('/').next().unwrap_or(ft).trim())
        .filter(|ft| !ft.is_empty());

    match from_filetype {
        Some(ext) => ext.to_lowercase(),
        None => {
            let path = strip_query(url);
            path.rsplit('.').next().unwrap_or(path).to_lowercase()
        }
    }
}

pub fn encode_data_uri(content_type: &str, bytes: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", content_type, payload)
}

fn strip_query(s: &str) -> &str {
    s.split('?').next().unwrap_or(s)
}

fn content_type(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn is_image(content_type: &str) -> bool {
    content_type.starts_with("image/")
}

fn checked(response: reqwest::Response) -> Result<reqwest::Response, ImageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(ImageError::Fetch {
        status: status.as_u16(),
        text: status.canonical_reason().unwrap_or_default().to_string(),
    })
}
