use crate::bot::{texts, Data};
use crate::db::ShareLinkRepo;
use crate::relay::IncomingPayload;
use crate::session::Mode;
use crate::telegram::{ChatAction, MessageRef};
use tracing::{debug, error, info};

/// `/upload`: switch the operator into ingest mode.
pub async fn enter(data: &Data, principal: i64, chat_id: i64) {
    data.sessions.enter(principal, Mode::AwaitingIngest);
    data.janitor
        .advise_tracked(
            &data.sessions,
            principal,
            chat_id,
            &texts::ingest_mode_entered(),
            data.settings.advisory_ttl,
        )
        .await;
    info!(principal, "Entered upload mode");
}

pub async fn reject(data: &Data, principal: i64, chat_id: i64) {
    data.janitor
        .advise_tracked(
            &data.sessions,
            principal,
            chat_id,
            &texts::ingest_rejected(),
            data.settings.advisory_ttl,
        )
        .await;
}

/// Store one submission and map it under its group's token.
///
/// Only the first member of a group that makes it into the vault announces
/// the share link; later members are appended silently.
pub async fn ingest(data: &Data, principal: i64, payload: IncomingPayload) {
    let chat_id = payload.source.chat_id;
    let group_key = payload.group_key.as_deref();
    let assignment = data.grouper.assign(group_key);
    let token = assignment.token();
    let share_url = token.share_url(&data.settings.bot_username);

    if let Err(e) = data
        .messenger
        .send_chat_action(chat_id, ChatAction::UploadDocument)
        .await
    {
        debug!("Chat action failed: {}", e);
    }

    let stored = match data
        .relay
        .store(&payload, &texts::vault_caption(&share_url))
        .await
    {
        Ok(stored) => stored,
        Err(e) => {
            error!(principal, kind = %payload.kind, "Failed to store payload: {}", e);
            report(data, principal, chat_id, &texts::ingest_failed()).await;
            return;
        }
    };

    if let Err(e) = ShareLinkRepo::append_to_group(&data.pool, token, &stored).await {
        error!(principal, "Failed to persist share link: {}", e);
        // Do not leave an unreachable copy behind in the vault
        data.relay
            .delete(MessageRef::new(data.relay.vault_chat_id(), stored.message_id))
            .await;
        report(data, principal, chat_id, &texts::generic_failure()).await;
        return;
    }

    if data.grouper.claim_announcement(group_key) {
        data.janitor
            .send_tracked(&data.sessions, principal, chat_id, &texts::ingest_stored(&share_url))
            .await;
        info!(principal, token = %token, "Stored payload under new share link");
    } else {
        debug!(principal, token = %token, "Appended group member silently");
    }
}

async fn report(data: &Data, principal: i64, chat_id: i64, html: &str) {
    data.janitor
        .advise_tracked(
            &data.sessions,
            principal,
            chat_id,
            html,
            data.settings.advisory_ttl,
        )
        .await;
}
