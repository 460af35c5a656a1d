use thiserror::Error;

/// Application-wide error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),

    /// Never carries the request URL: Bot API URLs embed the bot token.
    #[error("HTTP client error: {0}")]
    Http(reqwest::Error),

    /// The Bot API answered but refused the call.
    #[error("Upstream relay failure in {method}: {description}")]
    UpstreamRelay { method: String, description: String },

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Unauthorized principal: {0}")]
    UnauthorizedPrincipal(i64),

    #[error("Malformed revoke input")]
    MalformedRevokeInput,

    #[error("Link extraction failed: {0}")]
    Extraction(String),

    #[error("Staging I/O error: {0}")]
    Staging(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn upstream<M: Into<String>, D: Into<String>>(method: M, description: D) -> Self {
        Self::UpstreamRelay {
            method: method.into(),
            description: description.into(),
        }
    }

    pub fn extraction<S: Into<String>>(msg: S) -> Self {
        Self::Extraction(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Deleting a message that no longer exists is not worth a warning.
    pub fn is_already_deleted(&self) -> bool {
        match self {
            Self::UpstreamRelay { description, .. } => {
                let d = description.to_lowercase();
                d.contains("message to delete not found") || d.contains("message can't be deleted")
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.without_url())
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
