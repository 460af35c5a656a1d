pub mod commands;
pub mod handler;
pub mod texts;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::grouper::BatchGrouper;
use crate::janitor::Janitor;
use crate::relay::PayloadRelay;
use crate::scheduler::DeliveryScheduler;
use crate::session::SessionStore;
use crate::telegram::{Messenger, TelegramClient};
use crate::unlock::UnlockService;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use vaultlink_types::Update;

/// Pause before polling again after a failed `getUpdates`
const POLL_RETRY_DELAY: Duration = Duration::from_secs(3);

/// A principal's queue worker exits after this long without events
const QUEUE_IDLE: Duration = Duration::from_secs(60);

/// Values the handlers need from the configuration
#[derive(Debug, Clone)]
pub struct Settings {
    pub admin_id: i64,
    pub vault_chat_id: i64,
    pub bot_username: String,
    pub content_ttl: Duration,
    pub advisory_ttl: Duration,
}

impl Settings {
    pub fn from_config(config: &AppConfig, bot_username: String) -> Self {
        Self {
            admin_id: config.telegram.admin_id,
            vault_chat_id: config.telegram.vault_chat_id,
            bot_username,
            content_ttl: config.delivery.content_ttl(),
            advisory_ttl: config.delivery.advisory_ttl(),
        }
    }
}

/// Shared state accessible in all handlers
#[derive(Debug)]
pub struct Data {
    pub pool: DbPool,
    pub messenger: Arc<dyn Messenger>,
    pub relay: Arc<PayloadRelay>,
    pub grouper: BatchGrouper,
    pub scheduler: DeliveryScheduler,
    pub sessions: SessionStore,
    pub janitor: Arc<Janitor>,
    pub unlock: Option<UnlockService>,
    pub settings: Settings,
}

impl Data {
    pub fn new(
        pool: DbPool,
        messenger: Arc<dyn Messenger>,
        settings: Settings,
        group_ttl: Duration,
        protect_content: bool,
        unlock: Option<UnlockService>,
    ) -> Self {
        let relay = Arc::new(PayloadRelay::new(
            messenger.clone(),
            settings.vault_chat_id,
            protect_content,
        ));
        let janitor = Arc::new(Janitor::new(messenger.clone()));
        let scheduler = DeliveryScheduler::new(
            pool.clone(),
            relay.clone(),
            janitor.clone(),
            settings.content_ttl,
            settings.advisory_ttl,
            texts::DELIVERY_NOTICES,
        );

        Self {
            pool,
            messenger,
            relay,
            grouper: BatchGrouper::new(group_ttl),
            scheduler,
            sessions: SessionStore::new(),
            janitor,
            unlock,
            settings,
        }
    }

    pub fn is_privileged(&self, principal: i64) -> bool {
        principal == self.settings.admin_id
    }

    /// Gate for operator-only actions outside the session workflows
    pub fn authorize(&self, principal: i64) -> AppResult<()> {
        if self.is_privileged(principal) {
            Ok(())
        } else {
            Err(AppError::UnauthorizedPrincipal(principal))
        }
    }
}

/// Routes updates to one queue per principal.
///
/// Each queue is drained by a single worker task, so one principal's events
/// are handled strictly in arrival order while different principals run
/// concurrently.
struct Dispatcher {
    data: Arc<Data>,
    queues: DashMap<i64, mpsc::UnboundedSender<Update>>,
}

impl Dispatcher {
    fn dispatch(self: &Arc<Self>, update: Update) {
        let Some(principal) = update.sender().map(|user| user.id) else {
            debug!(update_id = update.update_id, "Update without a sender, skipped");
            return;
        };

        let update = match self.queues.get(&principal) {
            Some(queue) => match queue.send(update) {
                Ok(()) => return,
                // Worker went idle and closed its queue
                Err(mpsc::error::SendError(update)) => update,
            },
            None => update,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(update).is_err() {
            return;
        }
        self.queues.insert(principal, tx);
        tokio::spawn(self.clone().drain(principal, rx));
    }

    async fn drain(self: Arc<Self>, principal: i64, mut rx: mpsc::UnboundedReceiver<Update>) {
        loop {
            match tokio::time::timeout(QUEUE_IDLE, rx.recv()).await {
                Ok(Some(update)) => handler::handle_update(&self.data, update).await,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        rx.close();
        while let Ok(update) = rx.try_recv() {
            handler::handle_update(&self.data, update).await;
        }
        self.queues.remove_if(&principal, |_, queue| queue.is_closed());
    }
}

/// Long-poll the Bot API and dispatch updates until `shutdown` resolves.
pub async fn run(client: Arc<TelegramClient>, data: Arc<Data>, shutdown: impl Future<Output = ()>) {
    let dispatcher = Arc::new(Dispatcher {
        data,
        queues: DashMap::new(),
    });
    let mut offset = 0i64;
    tokio::pin!(shutdown);

    info!("Polling for updates...");
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Stopping update loop");
                break;
            }
            result = client.get_updates(offset) => match result {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        dispatcher.dispatch(update);
                    }
                }
                Err(e) => {
                    error!("Failed to fetch updates: {}", e);
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            }
        }
    }

    let pending = dispatcher.queues.len();
    if pending > 0 {
        warn!("Dropping {} principal queues on shutdown", pending);
    }
}
