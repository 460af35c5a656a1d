use crate::error::AppResult;
use rand::Rng;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// A downloaded file on local disk, removed when dropped.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    bytes: u64,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed staged file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to remove staged file: {}", e),
        }
    }
}

/// Streams downloads into the staging directory.
#[derive(Debug, Clone)]
pub struct Stager {
    http: Client,
    dir: PathBuf,
}

impl Stager {
    pub fn new(http: Client, dir: impl Into<PathBuf>) -> Self {
        Self {
            http,
            dir: dir.into(),
        }
    }

    /// Unique path for `file_name`, so concurrent downloads never collide.
    pub fn staging_path(&self, file_name: &str) -> PathBuf {
        let prefix: u32 = rand::thread_rng().gen();
        self.dir
            .join(format!("{:08x}_{}", prefix, sanitize_file_name(file_name)))
    }

    pub async fn download(&self, url: &str, file_name: &str) -> AppResult<StagedFile> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut response = self.http.get(url).send().await?.error_for_status()?;

        let mut staged = StagedFile {
            path: self.staging_path(file_name),
            bytes: 0,
        };
        let mut file = tokio::fs::File::create(&staged.path).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            staged.bytes += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(path = %staged.path.display(), bytes = staged.bytes, "Staged download");
        Ok(staged)
    }
}

/// Keep only the last path component and drop characters that are unsafe in
/// file names.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');
    if cleaned.is_empty() {
        super::client::DEFAULT_FILE_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}
