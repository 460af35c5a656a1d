//! Messaging transport.
//!
//! Everything the bot does on the platform goes through the [`Messenger`]
//! trait: sending and editing advisories, copying payloads between chats,
//! kind-specific re-uploads and deletions. [`TelegramClient`] implements it on
//! top of the Bot API; tests substitute a recording double.

pub mod client;
#[cfg(test)]
pub mod testing;

pub use client::TelegramClient;
pub use vaultlink_types::{ChatAction, InlineKeyboardButton, InlineKeyboardMarkup};

use crate::db::PayloadKind;
use crate::error::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Address of a message on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

impl MessageRef {
    pub fn new(chat_id: i64, message_id: i64) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

/// Options for relaying an existing message to another chat
#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    /// Replaces the original caption when set
    pub caption: Option<String>,
    pub keyboard: Option<InlineKeyboardMarkup>,
    /// Disallow forwarding and saving of the copy
    pub protect_content: bool,
}

/// Kind-specific re-send of an already uploaded file
#[derive(Debug, Clone)]
pub struct MediaSend {
    pub kind: PayloadKind,
    pub file_id: String,
    pub caption: Option<String>,
    pub spoiler: bool,
}

/// Operations the bot needs from the messaging platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send an HTML-formatted text message.
    async fn send_text(
        &self,
        chat_id: i64,
        html: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> AppResult<MessageRef>;

    /// Replace the text of a message previously sent by the bot.
    async fn edit_text(
        &self,
        target: MessageRef,
        html: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> AppResult<()>;

    /// Copy a message into another chat without a "forwarded from" header.
    async fn copy_message(
        &self,
        to_chat: i64,
        source: MessageRef,
        options: CopyOptions,
    ) -> AppResult<MessageRef>;

    /// Re-send an uploaded file by its platform file id.
    async fn send_media(&self, chat_id: i64, media: MediaSend) -> AppResult<MessageRef>;

    /// Upload a local video file.
    async fn upload_video(
        &self,
        chat_id: i64,
        path: &Path,
        caption: Option<String>,
        spoiler: bool,
    ) -> AppResult<MessageRef>;

    async fn delete_message(&self, target: MessageRef) -> AppResult<()>;

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> AppResult<()>;

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> AppResult<()>;
}

impl std::fmt::Debug for dyn Messenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Messenger")
    }
}
