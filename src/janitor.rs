//! Transient-message janitor: advisories that delete themselves, delayed
//! deletions and the session rollback helpers.

use crate::session::SessionStore;
use crate::telegram::{InlineKeyboardMarkup, MessageRef, Messenger};
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Owns every pending deletion timer.
pub struct Janitor {
    messenger: Arc<dyn Messenger>,
    timers: DashMap<u64, JoinHandle<()>>,
    next_timer: AtomicU64,
}

impl std::fmt::Debug for Janitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Janitor")
            .field("timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}

impl Janitor {
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self {
            messenger,
            timers: DashMap::new(),
            next_timer: AtomicU64::new(0),
        }
    }

    pub fn messenger(&self) -> &Arc<dyn Messenger> {
        &self.messenger
    }

    /// Delete one message now. Never fails; returns whether it is gone.
    pub async fn delete_now(&self, target: MessageRef) -> bool {
        delete_best_effort(self.messenger.as_ref(), target).await
    }

    /// Delete many messages concurrently; each attempt is independent.
    /// Returns how many deletions failed.
    pub async fn delete_all(&self, targets: &[MessageRef]) -> usize {
        delete_all(self.messenger.as_ref(), targets).await
    }

    /// Delete `target` after `delay`, fire-and-forget.
    pub fn schedule_deletion(&self, target: MessageRef, delay: Duration) {
        self.schedule_batch_deletion(vec![target], delay);
    }

    /// Delete all `targets` after one shared `delay`.
    pub fn schedule_batch_deletion(&self, targets: Vec<MessageRef>, delay: Duration) {
        if targets.is_empty() {
            return;
        }
        let messenger = self.messenger.clone();
        self.spawn_timer(async move {
            tokio::time::sleep(delay).await;
            let failed = delete_all(messenger.as_ref(), &targets).await;
            debug!(total = targets.len(), failed, "Scheduled deletion ran");
        });
    }

    /// Register an arbitrary timer task so it is aborted on shutdown.
    pub fn spawn_timer<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.timers.retain(|_, handle| !handle.is_finished());
        let id = self.next_timer.fetch_add(1, Ordering::Relaxed);
        self.timers.insert(id, tokio::spawn(task));
    }

    /// Send an advisory that removes itself after `ttl`.
    pub async fn advise(&self, chat_id: i64, html: &str, ttl: Duration) -> Option<MessageRef> {
        self.advise_with(chat_id, html, None, ttl).await
    }

    pub async fn advise_with(
        &self,
        chat_id: i64,
        html: &str,
        keyboard: Option<InlineKeyboardMarkup>,
        ttl: Duration,
    ) -> Option<MessageRef> {
        match self.messenger.send_text(chat_id, html, keyboard).await {
            Ok(sent) => {
                self.schedule_deletion(sent, ttl);
                Some(sent)
            }
            Err(e) => {
                warn!(chat_id, "Failed to send advisory: {}", e);
                None
            }
        }
    }

    /// Send an advisory that is tracked for the principal's session (and
    /// also expires on its own after `ttl`).
    pub async fn advise_tracked(
        &self,
        sessions: &SessionStore,
        principal: i64,
        chat_id: i64,
        html: &str,
        ttl: Duration,
    ) -> Option<MessageRef> {
        let sent = self.advise(chat_id, html, ttl).await?;
        self.track_for_session(sessions, principal, sent);
        Some(sent)
    }

    /// Send a message that only goes away when the session is cancelled.
    pub async fn send_tracked(
        &self,
        sessions: &SessionStore,
        principal: i64,
        chat_id: i64,
        html: &str,
    ) -> Option<MessageRef> {
        match self.messenger.send_text(chat_id, html, None).await {
            Ok(sent) => {
                self.track_for_session(sessions, principal, sent);
                Some(sent)
            }
            Err(e) => {
                warn!(chat_id, "Failed to send message: {}", e);
                None
            }
        }
    }

    /// Add a message to the principal's rollback set.
    pub fn track_for_session(&self, sessions: &SessionStore, principal: i64, target: MessageRef) {
        if !sessions.track(principal, target) {
            debug!(principal, ?target, "Principal is idle, message not tracked");
        }
    }

    /// Reset the principal to Idle and wipe everything tracked, immediately.
    pub async fn wipe_session(&self, sessions: &SessionStore, principal: i64) -> usize {
        let tracked = sessions.reset(principal);
        let total = tracked.len();
        let failed = self.delete_all(&tracked).await;
        total - failed
    }

    /// Timers that have not fired yet
    pub fn pending(&self) -> usize {
        self.timers
            .iter()
            .filter(|entry| !entry.value().is_finished())
            .count()
    }

    /// Abandon all pending timers.
    pub fn shutdown(&self) {
        let pending = self.pending();
        for entry in self.timers.iter() {
            entry.value().abort();
        }
        self.timers.clear();
        if pending > 0 {
            warn!("Abandoned {} pending deletion timers", pending);
        }
    }
}

pub(crate) async fn delete_best_effort(messenger: &dyn Messenger, target: MessageRef) -> bool {
    match messenger.delete_message(target).await {
        Ok(()) => true,
        // Cancel and the timer may both go after the same message
        Err(e) if e.is_already_deleted() => {
            debug!(?target, "Message already deleted");
            true
        }
        Err(e) => {
            warn!(?target, "Failed to delete message: {}", e);
            false
        }
    }
}

async fn delete_all(messenger: &dyn Messenger, targets: &[MessageRef]) -> usize {
    let results = join_all(
        targets
            .iter()
            .map(|target| delete_best_effort(messenger, *target)),
    )
    .await;
    results.into_iter().filter(|ok| !ok).count()
}
