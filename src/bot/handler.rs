use crate::bot::commands::{self, Command, CB_CLEAR_ALL, CB_CLEAR_SPECIFIC, CB_UNLOCK_AGAIN};
use crate::bot::{texts, Data};
use crate::relay::IncomingPayload;
use crate::session::{transition, Action, Trigger};
use crate::telegram::MessageRef;
use tracing::{debug, info, warn};
use vaultlink_types::{CallbackQuery, Message, Update};

pub async fn handle_update(data: &Data, update: Update) {
    if let Some(msg) = update.message {
        handle_message(data, msg).await;
    } else if let Some(callback) = update.callback_query {
        handle_callback(data, callback).await;
    }
}

/// Map a message onto the session trigger it represents
pub fn classify(command: Option<&Command>, has_media: bool) -> Trigger {
    match command {
        Some(Command::Upload) => Trigger::IngestCommand,
        Some(Command::Cancel) => Trigger::Cancel,
        Some(Command::Start(_) | Command::Admin) => Trigger::OtherCommand,
        Some(Command::Unknown(_)) => Trigger::UnknownCommand,
        None if has_media => Trigger::Media,
        None => Trigger::Text,
    }
}

async fn handle_message(data: &Data, msg: Message) {
    let Some(from) = msg.from.as_ref() else {
        return;
    };
    // Ignore bots and anything echoed from the vault itself
    if from.is_bot || msg.chat.id == data.settings.vault_chat_id {
        return;
    }

    let principal = from.id;
    let privileged = data.is_privileged(principal);
    let command = msg.text.as_deref().and_then(Command::parse);
    let payload = IncomingPayload::from_message(&msg);

    let mode = data.sessions.mode(principal);
    let trigger = classify(command.as_ref(), payload.is_some());
    let action = transition(mode, trigger, privileged);
    debug!(principal, ?mode, ?trigger, ?action, "Handling message");

    match action {
        Action::EnterIngest => commands::upload::enter(data, principal, msg.chat.id).await,
        Action::Ingest => {
            if let Some(payload) = payload {
                commands::upload::ingest(data, principal, payload).await;
            }
        }
        Action::RejectNonMedia => commands::upload::reject(data, principal, msg.chat.id).await,
        Action::EnterRevoke => {
            commands::admin::enter_revoke(data, principal, msg.chat.id).await;
        }
        Action::Revoke => commands::admin::revoke(data, principal, &msg).await,
        Action::Cancel => commands::cancel::cancel(data, principal, msg.chat.id).await,
        Action::Ignore => {
            if !privileged {
                debug!(principal, ?trigger, "Ignoring unauthorized request");
            }
        }
        Action::PassThrough => pass_through(data, principal, command, &msg).await,
    }
}

/// Regular handling outside the ingest and revoke workflows
async fn pass_through(
    data: &Data,
    principal: i64,
    command: Option<Command>,
    msg: &Message,
) {
    match command {
        Some(Command::Start(token)) => commands::start::start(data, msg, token.as_deref()).await,
        Some(Command::Admin) => match data.authorize(principal) {
            Ok(()) => commands::admin::panel(data, msg.chat.id).await,
            Err(e) => debug!("Ignoring /admin: {}", e),
        },
        Some(_) => {}
        None => {
            if let (Some(service), Some(text)) = (data.unlock.as_ref(), msg.text.as_deref()) {
                commands::unlock::handle_link(data, service, msg, text).await;
            }
        }
    }
}

async fn handle_callback(data: &Data, callback: CallbackQuery) {
    let principal = callback.from.id;
    let privileged = data.is_privileged(principal);
    let origin = callback
        .message
        .as_ref()
        .map(|m| MessageRef::new(m.chat.id, m.message_id));
    let chat_id = origin.map_or(principal, |m| m.chat_id);

    let mut answer: Option<&str> = None;
    match callback.data.as_deref() {
        Some(CB_CLEAR_SPECIFIC) => {
            let mode = data.sessions.mode(principal);
            match transition(mode, Trigger::RevokeMenu, privileged) {
                Action::EnterRevoke => commands::admin::enter_revoke(data, principal, chat_id).await,
                _ => debug!(principal, "Ignoring unauthorized revoke request"),
            }
        }
        Some(CB_CLEAR_ALL) => match (data.authorize(principal), origin) {
            (Ok(()), Some(panel)) => {
                commands::admin::clear_all(data, panel).await;
                answer = Some("Database wiped.");
            }
            (Ok(()), None) => debug!(principal, "Clear-all callback without its panel"),
            (Err(e), _) => debug!("Ignoring clear-all: {}", e),
        },
        Some(CB_UNLOCK_AGAIN) if data.unlock.is_some() => {
            data.janitor
                .advise(chat_id, &texts::unlock_prompt(), data.settings.advisory_ttl)
                .await;
        }
        other => info!(principal, data = ?other, "Unhandled callback"),
    }

    if let Err(e) = data.messenger.answer_callback(&callback.id, answer).await {
        warn!("Failed to answer callback: {}", e);
    }
}
