use crate::bot::commands::{CB_CLEAR_ALL, CB_CLEAR_SPECIFIC};
use crate::bot::{texts, Data};
use crate::db::{ShareLinkRepo, Token};
use crate::error::{AppError, AppResult};
use crate::session::Mode;
use crate::telegram::{InlineKeyboardButton, InlineKeyboardMarkup, MessageRef};
use futures::future::join_all;
use tracing::{debug, error, info, warn};
use vaultlink_types::Message;

/// Marker that precedes the token in a share URL
const START_MARKER: &str = "?start=";

/// Pull a token out of a bare token or a full share URL.
///
/// Everything after the last `?start=` is taken, so pasting the whole link
/// works as well as pasting just the token.
pub fn extract_token(input: &str) -> AppResult<Token> {
    let tail = input.rsplit(START_MARKER).next().unwrap_or(input);
    Token::parse(tail).map_err(|_| AppError::MalformedRevokeInput)
}

/// `/admin`: show the control panel.
pub async fn panel(data: &Data, chat_id: i64) {
    let count = match ShareLinkRepo::count_tokens(&data.pool).await {
        Ok(count) => count,
        Err(e) => {
            warn!("Failed to count share links: {}", e);
            0
        }
    };

    let keyboard = InlineKeyboardMarkup::single_column(vec![
        InlineKeyboardButton::callback("🗑 Clear Specific File", CB_CLEAR_SPECIFIC),
        InlineKeyboardButton::callback("⚠️ Clear ALL Database", CB_CLEAR_ALL),
    ]);
    data.janitor
        .advise_with(
            chat_id,
            &texts::admin_panel(count),
            Some(keyboard),
            data.settings.advisory_ttl,
        )
        .await;
}

/// "Clear specific file": wait for a link to revoke.
pub async fn enter_revoke(data: &Data, principal: i64, chat_id: i64) {
    data.sessions.enter(principal, Mode::AwaitingRevokeToken);
    data.janitor
        .advise_tracked(
            &data.sessions,
            principal,
            chat_id,
            &texts::revoke_prompt(),
            data.settings.advisory_ttl,
        )
        .await;
}

/// Revoke the token in `msg`. The session returns to Idle whatever happens.
pub async fn revoke(data: &Data, principal: i64, msg: &Message) {
    let input = msg.text_or_caption().unwrap_or_default();
    let result = match extract_token(input) {
        Ok(token) => revoke_token(data, &token).await,
        Err(e) => Err(e),
    };

    data.janitor.wipe_session(&data.sessions, principal).await;

    let reply = match result {
        Ok(report) if report.removed == 0 => texts::revoke_not_found(),
        Ok(report) => texts::revoke_done(report.removed, report.vault_failed),
        Err(AppError::MalformedRevokeInput) => {
            debug!(principal, "Revoke input held no token");
            texts::revoke_malformed()
        }
        Err(e) => {
            error!(principal, "Revoke failed: {}", e);
            texts::generic_failure()
        }
    };
    data.janitor
        .advise(msg.chat.id, &reply, data.settings.advisory_ttl)
        .await;
}

/// Outcome of revoking one token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevokeReport {
    /// Mapping rows removed from the store
    pub removed: u64,
    /// Vault copies that could not be deleted
    pub vault_failed: usize,
}

/// Delete the vault copies of a token, then its rows.
///
/// The rows go even when vault deletions fail, so the link stops working
/// either way; the report says how many copies were left behind.
pub async fn revoke_token(data: &Data, token: &Token) -> AppResult<RevokeReport> {
    let payloads = ShareLinkRepo::resolve(&data.pool, token.as_str()).await?;
    if payloads.is_empty() {
        return Ok(RevokeReport::default());
    }

    let vault = data.relay.vault_chat_id();
    let deleted = join_all(
        payloads
            .iter()
            .map(|p| data.relay.delete(MessageRef::new(vault, p.message_id))),
    )
    .await;
    let failed = deleted.iter().filter(|ok| !**ok).count();
    if failed > 0 {
        warn!(token = %token, failed, "Some vault copies could not be deleted");
    }

    let removed = ShareLinkRepo::revoke(&data.pool, token.as_str()).await?;
    info!(token = %token, removed, "Revoked share link");
    Ok(RevokeReport {
        removed,
        vault_failed: failed,
    })
}

/// "Clear ALL": drop every mapping and turn the panel into a confirmation.
pub async fn clear_all(data: &Data, panel: MessageRef) {
    let text = match ShareLinkRepo::clear(&data.pool).await {
        Ok(rows) => texts::cleared_all(rows),
        Err(e) => {
            error!("Failed to clear share links: {}", e);
            texts::generic_failure()
        }
    };

    if let Err(e) = data.messenger.edit_text(panel, &text, None).await {
        warn!("Failed to update admin panel: {}", e);
    }
    data.janitor.schedule_deletion(panel, data.settings.advisory_ttl);
}
