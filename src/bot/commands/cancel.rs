use crate::bot::{texts, Data};
use tracing::info;

/// `/cancel`: leave any workflow and wipe what it left on screen.
pub async fn cancel(data: &Data, principal: i64, chat_id: i64) {
    let wiped = data.janitor.wipe_session(&data.sessions, principal).await;
    if wiped > 0 {
        info!(principal, wiped, "Cancelled workflow");
    }
    data.janitor
        .advise(chat_id, &texts::cancelled(), data.settings.advisory_ttl)
        .await;
}
