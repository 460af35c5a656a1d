use std::sync::Arc;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vaultlink::{
    bot::{self, Data, Settings},
    config::AppConfig,
    db,
    telegram::{Messenger, TelegramClient},
    unlock::UnlockService,
    web,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the environment may already be set
    let _ = dotenvy::dotenv();

    let config = AppConfig::init()?;

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vaultlink=debug,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting VaultLink v{}", env!("CARGO_PKG_VERSION"));

    if config.telegram.bot_token.is_empty() {
        error!("Bot token not configured!");
        error!("Set telegram.bot_token in config/default.toml or VAULTLINK_TELEGRAM__BOT_TOKEN");
        return Err(anyhow::anyhow!("Bot token not configured"));
    }

    // Initialize database
    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    info!("Database connected: {}", config.database.url);
    db::init_db(&pool).await?;

    // Start keep-alive server in background
    let web_addr = format!("{}:{}", config.web.host, config.web.port);
    let listener = TcpListener::bind(&web_addr).await?;
    info!("Web server listening on http://{}", web_addr);
    let web_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, web::create_router()).await {
            error!("Web server error: {}", e);
        }
    });

    let client = Arc::new(
        TelegramClient::new(&config.telegram)?.with_upload_timeout(config.unlock.upload_timeout()),
    );
    let bot_username = match &config.telegram.bot_username {
        Some(name) => name.clone(),
        None => client
            .get_me()
            .await?
            .username
            .ok_or_else(|| anyhow::anyhow!("Bot account has no username"))?,
    };
    info!("Logged in as @{}", bot_username);

    let unlock = if config.unlock.enabled {
        if config.unlock.api_key.is_empty() {
            warn!("Link unlocking enabled without an API key; extraction requests will fail");
        }
        Some(UnlockService::new(&config.unlock)?)
    } else {
        None
    };

    let messenger: Arc<dyn Messenger> = client.clone();
    let data = Arc::new(Data::new(
        pool,
        messenger,
        Settings::from_config(config, bot_username),
        config.delivery.group_ttl(),
        config.delivery.protect_content,
        unlock,
    ));

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    };
    bot::run(client, data.clone(), shutdown).await;

    data.janitor.shutdown();
    web_handle.abort();
    info!("VaultLink stopped");

    Ok(())
}
