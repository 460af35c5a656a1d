//! Recording [`Messenger`] double for unit tests.

use crate::db::PayloadKind;
use crate::error::{AppError, AppResult};
use crate::telegram::{CopyOptions, MediaSend, MessageRef, Messenger};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use vaultlink_types::{ChatAction, InlineKeyboardMarkup};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SendText {
        chat_id: i64,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
        sent: MessageRef,
    },
    EditText {
        target: MessageRef,
        text: String,
    },
    Copy {
        to_chat: i64,
        source: MessageRef,
        caption: Option<String>,
        protect_content: bool,
        sent: MessageRef,
    },
    SendMedia {
        chat_id: i64,
        kind: PayloadKind,
        file_id: String,
        caption: Option<String>,
        spoiler: bool,
        sent: MessageRef,
    },
    UploadVideo {
        chat_id: i64,
        path: PathBuf,
        spoiler: bool,
        sent: MessageRef,
    },
    Delete(MessageRef),
    AnswerCallback(String),
    ChatAction(i64, ChatAction),
}

/// Records every call and hands out increasing message ids.
#[derive(Debug)]
pub struct RecordingMessenger {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicI64,
    failing_copies: Mutex<HashSet<i64>>,
    failing_deletes: Mutex<HashSet<i64>>,
    fail_sends: Mutex<bool>,
}

impl Default for RecordingMessenger {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1000),
            failing_copies: Mutex::new(HashSet::new()),
            failing_deletes: Mutex::new(HashSet::new()),
            fail_sends: Mutex::new(false),
        }
    }
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of this source message id will fail.
    pub fn fail_copy_of(&self, source_message_id: i64) {
        self.failing_copies.lock().unwrap().insert(source_message_id);
    }

    /// Deleting this message id will fail.
    pub fn fail_delete_of(&self, message_id: i64) {
        self.failing_deletes.lock().unwrap().insert(message_id);
    }

    /// Kind-specific re-uploads and video uploads will fail.
    pub fn fail_media_sends(&self) {
        *self.fail_sends.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Texts sent to a chat, in order
    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SendText {
                    chat_id: to, text, ..
                } if to == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn sent_text_refs(&self) -> Vec<MessageRef> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SendText { sent, .. } => Some(sent),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<(MessageRef, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::EditText { target, text } => Some((target, text)),
                _ => None,
            })
            .collect()
    }

    pub fn copies(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Copy { .. }))
            .collect()
    }

    pub fn media_sends(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::SendMedia { .. } | Call::UploadVideo { .. }))
            .collect()
    }

    /// Delete attempts, including the ones configured to fail
    pub fn deletes(&self) -> Vec<MessageRef> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(target) => Some(target),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_ref(&self, chat_id: i64) -> MessageRef {
        MessageRef::new(chat_id, self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(
        &self,
        chat_id: i64,
        html: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> AppResult<MessageRef> {
        let sent = self.next_ref(chat_id);
        self.record(Call::SendText {
            chat_id,
            text: html.to_string(),
            keyboard,
            sent,
        });
        Ok(sent)
    }

    async fn edit_text(
        &self,
        target: MessageRef,
        html: &str,
        _keyboard: Option<InlineKeyboardMarkup>,
    ) -> AppResult<()> {
        self.record(Call::EditText {
            target,
            text: html.to_string(),
        });
        Ok(())
    }

    async fn copy_message(
        &self,
        to_chat: i64,
        source: MessageRef,
        options: CopyOptions,
    ) -> AppResult<MessageRef> {
        if self.failing_copies.lock().unwrap().contains(&source.message_id) {
            return Err(AppError::upstream("copyMessage", "Bad Request: message to copy not found"));
        }
        let sent = self.next_ref(to_chat);
        self.record(Call::Copy {
            to_chat,
            source,
            caption: options.caption,
            protect_content: options.protect_content,
            sent,
        });
        Ok(sent)
    }

    async fn send_media(&self, chat_id: i64, media: MediaSend) -> AppResult<MessageRef> {
        if *self.fail_sends.lock().unwrap() {
            return Err(AppError::upstream("sendMedia", "Bad Request: wrong file identifier"));
        }
        let sent = self.next_ref(chat_id);
        self.record(Call::SendMedia {
            chat_id,
            kind: media.kind,
            file_id: media.file_id,
            caption: media.caption,
            spoiler: media.spoiler,
            sent,
        });
        Ok(sent)
    }

    async fn upload_video(
        &self,
        chat_id: i64,
        path: &Path,
        _caption: Option<String>,
        spoiler: bool,
    ) -> AppResult<MessageRef> {
        if *self.fail_sends.lock().unwrap() {
            return Err(AppError::upstream("sendVideo", "Request Entity Too Large"));
        }
        let sent = self.next_ref(chat_id);
        self.record(Call::UploadVideo {
            chat_id,
            path: path.to_path_buf(),
            spoiler,
            sent,
        });
        Ok(sent)
    }

    async fn delete_message(&self, target: MessageRef) -> AppResult<()> {
        self.record(Call::Delete(target));
        if self.failing_deletes.lock().unwrap().contains(&target.message_id) {
            return Err(AppError::upstream("deleteMessage", "Too Many Requests: retry after 5"));
        }
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, _text: Option<&str>) -> AppResult<()> {
        self.record(Call::AnswerCallback(callback_id.to_string()));
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> AppResult<()> {
        self.record(Call::ChatAction(chat_id, action));
        Ok(())
    }
}
