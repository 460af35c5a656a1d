//! Ephemeral delivery: resolve a token, relay every payload to the requester
//! and purge the relayed copies once the content TTL elapses.

use crate::db::{DbPool, PayloadRef, ShareLinkRepo};
use crate::error::AppResult;
use crate::janitor::Janitor;
use crate::relay::PayloadRelay;
use crate::telegram::{ChatAction, MessageRef};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPhase {
    Resolving,
    Delivering,
    Scheduled,
    Expired,
}

/// One resolve request and what came of it
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryBatch {
    pub requested_token: String,
    pub resolved: Vec<PayloadRef>,
    /// Delivered copies in arrival order, leading advisory first
    pub delivered: Vec<MessageRef>,
    pub failed: usize,
    pub ttl_deadline: Option<DateTime<Utc>>,
    pub phase: DeliveryPhase,
}

impl DeliveryBatch {
    fn new(token: &str) -> Self {
        Self {
            requested_token: token.to_string(),
            resolved: Vec::new(),
            delivered: Vec::new(),
            failed: 0,
            ttl_deadline: None,
            phase: DeliveryPhase::Resolving,
        }
    }

    /// Phase as seen at `now`; a scheduled batch past its deadline is expired.
    pub fn phase_at(&self, now: DateTime<Utc>) -> DeliveryPhase {
        match (self.phase, self.ttl_deadline) {
            (DeliveryPhase::Scheduled, Some(deadline)) if now >= deadline => DeliveryPhase::Expired,
            (phase, _) => phase,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    /// Nothing is mapped under the token
    InvalidToken,
    /// The token resolved but no payload could be relayed
    Undeliverable { failed: usize },
    Delivered(DeliveryBatch),
}

/// Wording of the advisories a delivery emits. Supplied by the front end.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryNotices {
    pub invalid_token: fn() -> String,
    /// Leading advisory: item count and content TTL
    pub header: fn(usize, Duration) -> String,
    /// Header replacement when some items failed: delivered, total, TTL
    pub partial: fn(usize, usize, Duration) -> String,
    pub failed: fn() -> String,
}

pub struct DeliveryScheduler {
    pool: DbPool,
    relay: Arc<PayloadRelay>,
    janitor: Arc<Janitor>,
    content_ttl: Duration,
    advisory_ttl: Duration,
    notices: DeliveryNotices,
}

impl std::fmt::Debug for DeliveryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryScheduler")
            .field("content_ttl", &self.content_ttl)
            .field("advisory_ttl", &self.advisory_ttl)
            .finish_non_exhaustive()
    }
}

impl DeliveryScheduler {
    pub fn new(
        pool: DbPool,
        relay: Arc<PayloadRelay>,
        janitor: Arc<Janitor>,
        content_ttl: Duration,
        advisory_ttl: Duration,
        notices: DeliveryNotices,
    ) -> Self {
        Self {
            pool,
            relay,
            janitor,
            content_ttl,
            advisory_ttl,
            notices,
        }
    }

    /// Deliver everything mapped under `token` to `chat_id`.
    ///
    /// Only storage failures are returned as errors. Relay failures are
    /// counted per item; the timer is armed as soon as one item got through.
    pub async fn deliver(&self, token: &str, chat_id: i64) -> AppResult<DeliveryOutcome> {
        let mut batch = DeliveryBatch::new(token);
        batch.resolved = ShareLinkRepo::resolve(&self.pool, token).await?;

        if batch.resolved.is_empty() {
            debug!(token, "Token resolved to nothing");
            self.janitor
                .advise(chat_id, &(self.notices.invalid_token)(), self.advisory_ttl)
                .await;
            return Ok(DeliveryOutcome::InvalidToken);
        }

        batch.phase = DeliveryPhase::Delivering;
        let messenger = self.janitor.messenger();
        let total = batch.resolved.len();

        let header = match messenger
            .send_text(chat_id, &(self.notices.header)(total, self.content_ttl), None)
            .await
        {
            Ok(sent) => Some(sent),
            Err(e) => {
                warn!(chat_id, "Failed to send delivery advisory: {}", e);
                None
            }
        };
        if let Err(e) = messenger.send_chat_action(chat_id, ChatAction::UploadDocument).await {
            debug!("Chat action failed: {}", e);
        }

        let mut copies = Vec::with_capacity(total);
        for payload in &batch.resolved {
            match self.relay.deliver(payload, chat_id).await {
                Ok(sent) => copies.push(sent),
                Err(e) => {
                    warn!(token, message_id = payload.message_id, "Failed to relay payload: {}", e);
                    batch.failed += 1;
                }
            }
        }

        if copies.is_empty() {
            self.report_failure(chat_id, header).await;
            return Ok(DeliveryOutcome::Undeliverable {
                failed: batch.failed,
            });
        }

        if batch.failed > 0 {
            if let Some(header) = header {
                let text = (self.notices.partial)(copies.len(), total, self.content_ttl);
                if let Err(e) = messenger.edit_text(header, &text, None).await {
                    warn!("Failed to update delivery advisory: {}", e);
                }
            }
        }

        batch.delivered = header.into_iter().chain(copies).collect();
        self.janitor
            .schedule_batch_deletion(batch.delivered.clone(), self.content_ttl);
        batch.ttl_deadline = chrono::Duration::from_std(self.content_ttl)
            .ok()
            .map(|ttl| Utc::now() + ttl);
        batch.phase = DeliveryPhase::Scheduled;

        info!(
            token,
            delivered = batch.delivered.len(),
            failed = batch.failed,
            "Delivery scheduled for deletion"
        );
        Ok(DeliveryOutcome::Delivered(batch))
    }

    async fn report_failure(&self, chat_id: i64, header: Option<MessageRef>) {
        let text = (self.notices.failed)();
        match header {
            Some(header) => {
                if let Err(e) = self.janitor.messenger().edit_text(header, &text, None).await {
                    warn!("Failed to update delivery advisory: {}", e);
                }
                self.janitor.schedule_deletion(header, self.advisory_ttl);
            }
            None => {
                self.janitor.advise(chat_id, &text, self.advisory_ttl).await;
            }
        }
    }
}
