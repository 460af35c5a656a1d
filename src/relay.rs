//! Payload relay: archives incoming payloads in the vault channel and relays
//! caption-stripped copies to recipients.

use crate::db::{PayloadKind, PayloadRef};
use crate::error::AppResult;
use crate::janitor::delete_best_effort;
use crate::telegram::{CopyOptions, InlineKeyboardMarkup, MediaSend, MessageRef, Messenger};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use vaultlink_types::Message;

/// Caption put on delivered copies. Telegram keeps the original caption when
/// none is given, and rejects an empty one, so a zero-width space replaces it.
pub const BLANK_CAPTION: &str = "\u{200B}";

/// A media submission from a principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingPayload {
    pub source: MessageRef,
    pub kind: PayloadKind,
    /// Platform file id for kind-specific re-uploads
    pub file_id: Option<String>,
    pub caption: Option<String>,
    /// Correlation id of a burst of items sent together
    pub group_key: Option<String>,
}

impl IncomingPayload {
    /// Classify a message. Returns `None` for messages without media.
    pub fn from_message(msg: &Message) -> Option<Self> {
        let (kind, file_id) = if let Some(photo) = msg.largest_photo() {
            (PayloadKind::Photo, Some(photo.file_id.clone()))
        } else if let Some(video) = &msg.video {
            (PayloadKind::Video, Some(video.file_id.clone()))
        } else if let Some(document) = &msg.document {
            (PayloadKind::Document, Some(document.file_id.clone()))
        } else if let Some(audio) = &msg.audio {
            (PayloadKind::Audio, Some(audio.file_id.clone()))
        } else if msg.voice.is_some()
            || msg.animation.is_some()
            || msg.sticker.is_some()
            || msg.video_note.is_some()
        {
            (PayloadKind::Generic, None)
        } else {
            return None;
        };

        Some(Self {
            source: MessageRef::new(msg.chat.id, msg.message_id),
            kind,
            file_id,
            caption: msg.caption.clone(),
            group_key: msg.media_group_id.clone(),
        })
    }
}

/// Stores payloads in the vault and relays them back out.
pub struct PayloadRelay {
    messenger: Arc<dyn Messenger>,
    vault_chat_id: i64,
    protect_content: bool,
}

impl std::fmt::Debug for PayloadRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadRelay")
            .field("vault_chat_id", &self.vault_chat_id)
            .field("protect_content", &self.protect_content)
            .finish_non_exhaustive()
    }
}

impl PayloadRelay {
    pub fn new(messenger: Arc<dyn Messenger>, vault_chat_id: i64, protect_content: bool) -> Self {
        Self {
            messenger,
            vault_chat_id,
            protect_content,
        }
    }

    pub fn vault_chat_id(&self) -> i64 {
        self.vault_chat_id
    }

    /// Archive a payload in the vault, tagged with `vault_caption`.
    ///
    /// Kinds with a file id are re-sent through their kind-specific method so
    /// the caption and the spoiler flag can be set; anything else is copied
    /// verbatim.
    pub async fn store(&self, payload: &IncomingPayload, vault_caption: &str) -> AppResult<PayloadRef> {
        let stored = match (&payload.file_id, payload.kind.send_method()) {
            (Some(file_id), Some(_)) => {
                let caption = match payload.caption.as_deref() {
                    Some(original) if !original.trim().is_empty() => {
                        format!("{}\n\n{}", html_escape(original), vault_caption)
                    }
                    _ => vault_caption.to_string(),
                };
                self.messenger
                    .send_media(
                        self.vault_chat_id,
                        MediaSend {
                            kind: payload.kind,
                            file_id: file_id.clone(),
                            caption: Some(caption),
                            spoiler: payload.kind.requires_reveal(),
                        },
                    )
                    .await?
            }
            _ => {
                self.messenger
                    .copy_message(self.vault_chat_id, payload.source, CopyOptions::default())
                    .await?
            }
        };

        debug!(kind = %payload.kind, message_id = stored.message_id, "Stored payload in vault");
        Ok(PayloadRef {
            message_id: stored.message_id,
            kind: payload.kind,
        })
    }

    /// Upload a staged local video into the vault.
    pub async fn store_file(&self, path: &Path, vault_caption: &str) -> AppResult<PayloadRef> {
        let stored = self
            .messenger
            .upload_video(
                self.vault_chat_id,
                path,
                Some(vault_caption.to_string()),
                PayloadKind::Video.requires_reveal(),
            )
            .await?;

        Ok(PayloadRef {
            message_id: stored.message_id,
            kind: PayloadKind::Video,
        })
    }

    /// Relay a stored payload to a recipient without its vault caption.
    pub async fn deliver(&self, payload: &PayloadRef, chat_id: i64) -> AppResult<MessageRef> {
        self.deliver_with(payload, chat_id, None).await
    }

    pub async fn deliver_with(
        &self,
        payload: &PayloadRef,
        chat_id: i64,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> AppResult<MessageRef> {
        let options = CopyOptions {
            caption: payload
                .kind
                .carries_caption()
                .then(|| BLANK_CAPTION.to_string()),
            keyboard,
            protect_content: self.protect_content,
        };
        self.messenger
            .copy_message(
                chat_id,
                MessageRef::new(self.vault_chat_id, payload.message_id),
                options,
            )
            .await
    }

    /// Best-effort deletion. Failures are logged and reported as `false`.
    pub async fn delete(&self, target: MessageRef) -> bool {
        delete_best_effort(self.messenger.as_ref(), target).await
    }
}

/// Escape text for inclusion in an HTML-formatted message.
pub fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::testing::{Call, RecordingMessenger};

    const VAULT: i64 = -100_500;

    fn message(raw: serde_json::Value) -> Message {
        serde_json::from_value(raw).unwrap()
    }

    fn relay(messenger: &Arc<RecordingMessenger>) -> PayloadRelay {
        PayloadRelay::new(messenger.clone(), VAULT, false)
    }

    #[test]
    fn test_classifies_media_kinds() {
        let photo = message(serde_json::json!({
            "message_id": 1, "chat": {"id": 5},
            "photo": [{"file_id": "p-small", "width": 10, "height": 10}, {"file_id": "p-big", "width": 100, "height": 100}],
            "media_group_id": "G"
        }));
        let payload = IncomingPayload::from_message(&photo).unwrap();
        assert_eq!(payload.kind, PayloadKind::Photo);
        assert_eq!(payload.file_id.as_deref(), Some("p-big"));
        assert_eq!(payload.group_key.as_deref(), Some("G"));

        let sticker = message(serde_json::json!({
            "message_id": 2, "chat": {"id": 5}, "sticker": {"file_id": "s"}
        }));
        assert_eq!(IncomingPayload::from_message(&sticker).unwrap().kind, PayloadKind::Generic);

        let text = message(serde_json::json!({
            "message_id": 3, "chat": {"id": 5}, "text": "hello"
        }));
        assert!(IncomingPayload::from_message(&text).is_none());
    }

    #[tokio::test]
    async fn test_store_video_sets_spoiler_and_caption() {
        let messenger = Arc::new(RecordingMessenger::new());
        let payload = IncomingPayload {
            source: MessageRef::new(7, 70),
            kind: PayloadKind::Video,
            file_id: Some("vid".to_string()),
            caption: Some("a < b".to_string()),
            group_key: None,
        };

        let stored = relay(&messenger).store(&payload, "LINK").await.unwrap();
        assert_eq!(stored.kind, PayloadKind::Video);

        match &messenger.calls()[0] {
            Call::SendMedia {
                chat_id,
                kind,
                caption,
                spoiler,
                sent,
                ..
            } => {
                assert_eq!(*chat_id, VAULT);
                assert_eq!(*kind, PayloadKind::Video);
                assert!(*spoiler);
                assert_eq!(caption.as_deref(), Some("a &lt; b\n\nLINK"));
                assert_eq!(sent.message_id, stored.message_id);
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_store_generic_copies_verbatim() {
        let messenger = Arc::new(RecordingMessenger::new());
        let payload = IncomingPayload {
            source: MessageRef::new(7, 71),
            kind: PayloadKind::Generic,
            file_id: None,
            caption: None,
            group_key: None,
        };

        relay(&messenger).store(&payload, "LINK").await.unwrap();
        match &messenger.calls()[0] {
            Call::Copy {
                to_chat,
                source,
                caption,
                ..
            } => {
                assert_eq!(*to_chat, VAULT);
                assert_eq!(*source, MessageRef::new(7, 71));
                assert!(caption.is_none());
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deliver_strips_caption() {
        let messenger = Arc::new(RecordingMessenger::new());
        let payload = PayloadRef {
            message_id: 900,
            kind: PayloadKind::Photo,
        };

        let delivered = relay(&messenger).deliver(&payload, 42).await.unwrap();
        assert_eq!(delivered.chat_id, 42);
        match &messenger.calls()[0] {
            Call::Copy { source, caption, .. } => {
                assert_eq!(*source, MessageRef::new(VAULT, 900));
                assert_eq!(caption.as_deref(), Some(BLANK_CAPTION));
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_is_best_effort() {
        let messenger = Arc::new(RecordingMessenger::new());
        messenger.fail_delete_of(5);
        let relay = relay(&messenger);

        assert!(!relay.delete(MessageRef::new(1, 5)).await);
        assert!(relay.delete(MessageRef::new(1, 6)).await);
        assert_eq!(messenger.deletes().len(), 2);
    }
}
