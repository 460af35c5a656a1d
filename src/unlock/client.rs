use crate::config::UnlockConfig;
use crate::error::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Header carrying the extraction service API key
const API_KEY_HEADER: &str = "xAPIverse-Key";

/// File name used when the service does not report one
pub const DEFAULT_FILE_NAME: &str = "terabox_video.mp4";

#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    url: &'a str,
}

/// Raw reply of the extraction service
#[derive(Debug, Deserialize)]
pub struct ExtractResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub list: Vec<ExtractedEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractedEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fast_download_link: Option<String>,
    #[serde(default)]
    pub download_link: Option<String>,
}

/// A direct download resolved from a share link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub download_url: String,
    pub file_name: String,
}

impl ExtractResponse {
    /// Pick the first listed file, preferring the fast mirror.
    pub fn into_extracted(self) -> AppResult<Extracted> {
        if self.status.as_deref() != Some("success") {
            return Err(AppError::extraction(
                self.message
                    .unwrap_or_else(|| "API returned an error".to_string()),
            ));
        }

        let entry = self
            .list
            .into_iter()
            .next()
            .ok_or_else(|| AppError::extraction("API returned an empty list"))?;

        let non_empty = |link: Option<String>| link.filter(|l| !l.trim().is_empty());
        let download_url = non_empty(entry.fast_download_link)
            .or_else(|| non_empty(entry.download_link))
            .ok_or_else(|| {
                AppError::extraction("Failed to extract video. The link might be dead or private.")
            })?;

        let file_name = entry
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());

        Ok(Extracted {
            download_url,
            file_name,
        })
    }
}

/// Client for the link extraction service
pub struct ExtractionClient {
    http: Client,
    api_url: String,
    api_key: String,
}

impl std::fmt::Debug for ExtractionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl ExtractionClient {
    pub fn new(config: &UnlockConfig) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Resolve a share link into a direct download.
    pub async fn extract(&self, link: &str) -> AppResult<Extracted> {
        debug!("Extracting download for {}", link);

        let response = self
            .http
            .post(&self.api_url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&ExtractRequest { url: link })
            .send()
            .await
            .map_err(|e| {
                error!("Extraction request failed: {}", e);
                AppError::extraction(format!("API request failed: {}", e))
            })?;

        let body: ExtractResponse = response.json().await.map_err(|e| {
            error!("Failed to parse extraction response: {}", e);
            AppError::extraction("API returned an unreadable response")
        })?;

        body.into_extracted()
    }
}
