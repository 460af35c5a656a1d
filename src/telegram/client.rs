use crate::config::TelegramConfig;
use crate::error::{AppError, AppResult};
use crate::telegram::{CopyOptions, MediaSend, MessageRef, Messenger};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};
use vaultlink_types::{
    ApiResponse, ChatAction, InlineKeyboardMarkup, Message, MessageId, Update, User,
};

/// Extra headroom on top of the long-polling timeout
const HTTP_TIMEOUT_MARGIN_SECS: u64 = 15;

/// Multipart uploads run far longer than JSON calls
const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(900);

/// Bot API client
pub struct TelegramClient {
    http: Client,
    config: TelegramConfig,
    upload_timeout: Duration,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The bot token is part of every URL; keep it out of logs.
        f.debug_struct("TelegramClient")
            .field("api_base", &self.config.api_base)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(
                config.poll_timeout_secs + HTTP_TIMEOUT_MARGIN_SECS,
            ))
            .build()?;

        Ok(Self {
            http,
            config: config.clone(),
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
        })
    }

    /// Override the per-request timeout used for file uploads.
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    /// Call a JSON Bot API method and unwrap its envelope.
    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> AppResult<T> {
        debug!(method, "Bot API call");
        // Error replies come with 4xx status codes but still carry the JSON
        // envelope, so the status is not checked here.
        let response: ApiResponse<T> = self
            .http
            .post(self.config.method_url(method))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        unwrap_response(method, response)
    }

    /// Identity of the bot itself
    pub async fn get_me(&self) -> AppResult<User> {
        self.call("getMe", json!({})).await
    }

    /// Long-poll for new updates starting at `offset`.
    pub async fn get_updates(&self, offset: i64) -> AppResult<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": self.config.poll_timeout_secs,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }
}

pub(crate) fn unwrap_response<T>(method: &str, response: ApiResponse<T>) -> AppResult<T> {
    if !response.ok {
        let description = response
            .description
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(AppError::upstream(method, description));
    }
    response
        .result
        .ok_or_else(|| AppError::upstream(method, "response without result"))
}

fn insert_keyboard(body: &mut Map<String, Value>, keyboard: Option<InlineKeyboardMarkup>) -> AppResult<()> {
    if let Some(keyboard) = keyboard {
        let markup = serde_json::to_value(keyboard)
            .map_err(|e| AppError::internal(format!("Failed to encode keyboard: {}", e)))?;
        body.insert("reply_markup".to_string(), markup);
    }
    Ok(())
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_text(
        &self,
        chat_id: i64,
        html: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> AppResult<MessageRef> {
        let mut body = Map::new();
        body.insert("chat_id".into(), json!(chat_id));
        body.insert("text".into(), json!(html));
        body.insert("parse_mode".into(), json!("HTML"));
        body.insert("link_preview_options".into(), json!({"is_disabled": true}));
        insert_keyboard(&mut body, keyboard)?;

        let message: Message = self.call("sendMessage", Value::Object(body)).await?;
        Ok(MessageRef::new(message.chat.id, message.message_id))
    }

    async fn edit_text(
        &self,
        target: MessageRef,
        html: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> AppResult<()> {
        let mut body = Map::new();
        body.insert("chat_id".into(), json!(target.chat_id));
        body.insert("message_id".into(), json!(target.message_id));
        body.insert("text".into(), json!(html));
        body.insert("parse_mode".into(), json!("HTML"));
        insert_keyboard(&mut body, keyboard)?;

        // Result is either the edited message or `true`
        let _: Value = self.call("editMessageText", Value::Object(body)).await?;
        Ok(())
    }

    async fn copy_message(
        &self,
        to_chat: i64,
        source: MessageRef,
        options: CopyOptions,
    ) -> AppResult<MessageRef> {
        let mut body = Map::new();
        body.insert("chat_id".into(), json!(to_chat));
        body.insert("from_chat_id".into(), json!(source.chat_id));
        body.insert("message_id".into(), json!(source.message_id));
        if let Some(caption) = options.caption {
            body.insert("caption".into(), json!(caption));
            body.insert("parse_mode".into(), json!("HTML"));
        }
        if options.protect_content {
            body.insert("protect_content".into(), json!(true));
        }
        insert_keyboard(&mut body, options.keyboard)?;

        let copied: MessageId = self.call("copyMessage", Value::Object(body)).await?;
        Ok(MessageRef::new(to_chat, copied.message_id))
    }

    async fn send_media(&self, chat_id: i64, media: MediaSend) -> AppResult<MessageRef> {
        let (method, field) = media.kind.send_method().ok_or_else(|| {
            AppError::internal(format!("No re-upload method for {} payloads", media.kind))
        })?;

        let mut body = Map::new();
        body.insert("chat_id".into(), json!(chat_id));
        body.insert(field.into(), json!(media.file_id));
        if let Some(caption) = media.caption {
            body.insert("caption".into(), json!(caption));
            body.insert("parse_mode".into(), json!("HTML"));
        }
        if media.spoiler {
            body.insert("has_spoiler".into(), json!(true));
        }

        let message: Message = self.call(method, Value::Object(body)).await?;
        Ok(MessageRef::new(message.chat.id, message.message_id))
    }

    async fn upload_video(
        &self,
        chat_id: i64,
        path: &Path,
        caption: Option<String>,
        spoiler: bool,
    ) -> AppResult<MessageRef> {
        let file = tokio::fs::File::open(path).await?;
        let length = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part(
                "video",
                Part::stream_with_length(Body::from(file), length).file_name(file_name),
            )
            .text("supports_streaming", "true");
        if let Some(caption) = caption {
            form = form.text("caption", caption).text("parse_mode", "HTML");
        }
        if spoiler {
            form = form.text("has_spoiler", "true");
        }

        debug!(method = "sendVideo", length, "Bot API multipart upload");
        let response: ApiResponse<Message> = self
            .http
            .post(self.config.method_url("sendVideo"))
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;

        let message = unwrap_response("sendVideo", response)?;
        Ok(MessageRef::new(message.chat.id, message.message_id))
    }

    async fn delete_message(&self, target: MessageRef) -> AppResult<()> {
        let deleted: bool = self
            .call(
                "deleteMessage",
                json!({"chat_id": target.chat_id, "message_id": target.message_id}),
            )
            .await?;
        if !deleted {
            warn!(?target, "deleteMessage returned false");
        }
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> AppResult<()> {
        let mut body = Map::new();
        body.insert("callback_query_id".into(), json!(callback_id));
        if let Some(text) = text {
            body.insert("text".into(), json!(text));
        }
        let _: bool = self.call("answerCallbackQuery", Value::Object(body)).await?;
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> AppResult<()> {
        let _: bool = self
            .call(
                "sendChatAction",
                json!({"chat_id": chat_id, "action": action.as_str()}),
            )
            .await?;
        Ok(())
    }
}
