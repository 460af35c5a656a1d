use crate::bot::commands::CB_UNLOCK_AGAIN;
use crate::bot::{texts, Data};
use crate::db::{ShareLinkRepo, Token};
use crate::error::AppResult;
use crate::telegram::{ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, MessageRef};
use crate::unlock::UnlockService;
use tracing::{debug, info, warn};
use vaultlink_types::Message;

/// Handle a text that may hold a supported share link.
///
/// The requester's message is always removed. Anything without a known link
/// marker gets a short-lived "send a valid link" advisory.
pub async fn handle_link(data: &Data, service: &UnlockService, msg: &Message, text: &str) {
    let chat_id = msg.chat.id;
    data.janitor
        .delete_now(MessageRef::new(chat_id, msg.message_id))
        .await;

    if !service.matches(text) {
        data.janitor
            .advise(chat_id, &texts::unlock_invalid_link(), data.settings.advisory_ttl)
            .await;
        return;
    }

    let progress = match data
        .messenger
        .send_text(
            chat_id,
            &texts::unlock_progress("🔍 <b>Validating link...</b>", 20),
            None,
        )
        .await
    {
        Ok(sent) => sent,
        Err(e) => {
            warn!(chat_id, "Failed to send progress message: {}", e);
            return;
        }
    };

    match run_pipeline(data, service, chat_id, progress, text).await {
        Ok(token) => {
            info!(chat_id, token = %token, "Unlocked link delivered");
            data.janitor.delete_now(progress).await;
        }
        Err((stage, e)) => {
            warn!(chat_id, stage, "Unlock failed: {}", e);
            if let Err(e) = data
                .messenger
                .edit_text(progress, &texts::unlock_failed(stage), None)
                .await
            {
                debug!("Failed to update progress message: {}", e);
            }
            data.janitor
                .schedule_deletion(progress, data.settings.advisory_ttl);
        }
    }
}

type StageResult<T> = Result<T, (&'static str, crate::error::AppError)>;

fn stage<T>(name: &'static str, result: AppResult<T>) -> StageResult<T> {
    result.map_err(|e| (name, e))
}

async fn run_pipeline(
    data: &Data,
    service: &UnlockService,
    chat_id: i64,
    progress: MessageRef,
    link: &str,
) -> StageResult<Token> {
    chat_action(data, chat_id, ChatAction::Typing).await;
    let extracted = stage("Extraction error", service.extract(link).await)?;

    step(data, progress, "⬇️ <b>Downloading...</b>", 60).await;
    chat_action(data, chat_id, ChatAction::RecordVideo).await;
    let staged = stage("Download failed", service.stage(&extracted).await)?;
    debug!(bytes = staged.bytes(), "Download staged");

    step(data, progress, "📤 <b>Uploading to secure vault...</b>", 80).await;
    chat_action(data, chat_id, ChatAction::UploadVideo).await;
    let token = Token::generate();
    let share_url = token.share_url(&data.settings.bot_username);
    let stored = stage(
        "Upload error",
        data.relay
            .store_file(staged.path(), &texts::vault_caption(&share_url))
            .await,
    )?;
    drop(staged);

    stage(
        "Upload error",
        ShareLinkRepo::append_to_group(&data.pool, &token, &stored).await,
    )?;

    step(data, progress, "✅ <b>Finalizing Delivery...</b>", 100).await;
    let keyboard = InlineKeyboardMarkup::single_column(vec![InlineKeyboardButton::callback(
        "⬇️ Download More",
        CB_UNLOCK_AGAIN,
    )]);
    let delivered = stage(
        "Delivery error",
        data.relay.deliver_with(&stored, chat_id, Some(keyboard)).await,
    )?;
    data.janitor
        .schedule_deletion(delivered, data.settings.content_ttl);

    Ok(token)
}

async fn step(data: &Data, progress: MessageRef, label: &str, percent: u8) {
    if let Err(e) = data
        .messenger
        .edit_text(progress, &texts::unlock_progress(label, percent), None)
        .await
    {
        debug!("Failed to update progress message: {}", e);
    }
}

async fn chat_action(data: &Data, chat_id: i64, action: ChatAction) {
    if let Err(e) = data.messenger.send_chat_action(chat_id, action).await {
        debug!("Chat action failed: {}", e);
    }
}
