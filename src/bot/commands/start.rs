use crate::bot::{texts, Data};
use crate::db::Token;
use crate::scheduler::DeliveryOutcome;
use crate::telegram::MessageRef;
use tracing::{debug, error};
use vaultlink_types::Message;

/// `/start [token]`: welcome, or resolve a share link.
///
/// The requester's own `/start` message is removed first so the token does
/// not stay in their chat history.
pub async fn start(data: &Data, msg: &Message, token: Option<&str>) {
    let chat_id = msg.chat.id;
    data.janitor
        .delete_now(MessageRef::new(chat_id, msg.message_id))
        .await;

    let Some(raw) = token else {
        let name = msg.from.as_ref().map(|u| u.first_name.as_str());
        data.janitor
            .advise(chat_id, &texts::welcome(name), data.settings.advisory_ttl)
            .await;
        return;
    };

    let token = match Token::parse(raw) {
        Ok(token) => token,
        Err(e) => {
            debug!(chat_id, "Rejected start token: {}", e);
            data.janitor
                .advise(chat_id, &texts::invalid_token(), data.settings.advisory_ttl)
                .await;
            return;
        }
    };

    match data.scheduler.deliver(token.as_str(), chat_id).await {
        Ok(DeliveryOutcome::Delivered(batch)) => {
            debug!(chat_id, delivered = batch.delivered.len(), "Delivered share link");
        }
        Ok(outcome) => debug!(chat_id, ?outcome, "Nothing delivered"),
        Err(e) => {
            error!(chat_id, "Delivery failed: {}", e);
            data.janitor
                .advise(chat_id, &texts::generic_failure(), data.settings.advisory_ttl)
                .await;
        }
    }
}
