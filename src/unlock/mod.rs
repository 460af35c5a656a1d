//! Optional link-unlock flow: resolve a third-party share link into a direct
//! download, stage it locally and hand it to the vault.

pub mod client;
pub mod staging;

pub use client::{Extracted, ExtractionClient};
pub use staging::{StagedFile, Stager};

use crate::config::UnlockConfig;
use crate::error::AppResult;
use reqwest::Client;
use std::time::Duration;

#[derive(Debug)]
pub struct UnlockService {
    extractor: ExtractionClient,
    stager: Stager,
    link_markers: Vec<String>,
}

impl UnlockService {
    pub fn new(config: &UnlockConfig) -> AppResult<Self> {
        let download_http = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            extractor: ExtractionClient::new(config)?,
            stager: Stager::new(download_http, &config.staging_dir),
            link_markers: config
                .link_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
        })
    }

    /// Whether a text contains a supported share link
    pub fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.link_markers.iter().any(|m| text.contains(m.as_str()))
    }

    pub async fn extract(&self, link: &str) -> AppResult<Extracted> {
        self.extractor.extract(link.trim()).await
    }

    pub async fn stage(&self, extracted: &Extracted) -> AppResult<StagedFile> {
        self.stager
            .download(&extracted.download_url, &extracted.file_name)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_configured_markers_case_insensitively() {
        let service = UnlockService::new(&UnlockConfig::default()).unwrap();
        assert!(service.matches("https://www.TeraBox.com/s/1abc"));
        assert!(service.matches("look: https://1024tera.com/s/xyz"));
        assert!(!service.matches("https://example.com/video"));
    }
}
