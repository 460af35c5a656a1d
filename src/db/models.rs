use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Random bytes per token (64 bits of entropy)
pub const TOKEN_BYTES: usize = 8;

/// One (token, payload) row of the share table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ShareLink {
    pub id: i64,
    pub token: String,
    pub payload_message_id: i64,
    pub payload_kind: String,
    pub created_at: DateTime<Utc>,
}

impl ShareLink {
    pub fn payload_ref(&self) -> PayloadRef {
        PayloadRef {
            message_id: self.payload_message_id,
            kind: PayloadKind::parse(&self.payload_kind),
        }
    }
}

/// Opaque, unguessable share token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Generate a fresh URL-safe token from the OS random source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Accept a token as typed by a user. Only the URL-safe base64 alphabet is
    /// allowed; anything else cannot have been minted here.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let raw = raw.trim();
        let valid = !raw.is_empty()
            && raw.len() <= 64
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AppError::InvalidToken);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shareable deep link that opens the bot with this token
    pub fn share_url(&self, bot_username: &str) -> String {
        format!("https://t.me/{}?start={}", bot_username, self.0)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Media kind of a stored payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadKind {
    Photo,
    Video,
    Document,
    Audio,
    Generic,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Document => "document",
            Self::Audio => "audio",
            Self::Generic => "generic",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "photo" => Self::Photo,
            "video" => Self::Video,
            "document" => Self::Document,
            "audio" => Self::Audio,
            _ => Self::Generic,
        }
    }

    /// Video content is always hidden behind a tap-to-reveal spoiler.
    pub fn requires_reveal(&self) -> bool {
        matches!(self, Self::Video)
    }

    /// Whether the vault copy carries a caption that must be stripped on delivery
    pub fn carries_caption(&self) -> bool {
        !matches!(self, Self::Generic)
    }

    /// Bot API method used for a kind-specific re-upload
    pub fn send_method(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Photo => Some(("sendPhoto", "photo")),
            Self::Video => Some(("sendVideo", "video")),
            Self::Document => Some(("sendDocument", "document")),
            Self::Audio => Some(("sendAudio", "audio")),
            Self::Generic => None,
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a payload archived in the vault channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayloadRef {
    pub message_id: i64,
    pub kind: PayloadKind,
}
