use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Telegram bot configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    /// Bot API token issued by BotFather
    pub bot_token: String,
    /// Bot API base URL (overridable for local API servers and tests)
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Private channel the ingested payloads are archived in
    pub vault_chat_id: i64,
    /// The single privileged principal
    pub admin_id: i64,
    /// Username used to build share links; fetched via `getMe` when absent
    #[serde(default)]
    pub bot_username: Option<String>,
    /// Long-polling timeout for `getUpdates`
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

/// Lifetimes of delivered content and advisories
#[derive(Debug, Deserialize, Clone)]
pub struct DeliveryConfig {
    /// Delivered copies are purged after this many seconds
    #[serde(default = "default_content_ttl")]
    pub content_ttl_secs: u64,
    /// Status/feedback messages are purged after this many seconds
    #[serde(default = "default_advisory_ttl")]
    pub advisory_ttl_secs: u64,
    /// Batch-group entries are forgotten after this many seconds
    #[serde(default = "default_group_ttl")]
    pub group_ttl_secs: u64,
    /// Mark delivered copies as non-forwardable
    #[serde(default)]
    pub protect_content: bool,
}

fn default_content_ttl() -> u64 {
    300
}

fn default_advisory_ttl() -> u64 {
    120
}

fn default_group_ttl() -> u64 {
    120
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            content_ttl_secs: default_content_ttl(),
            advisory_ttl_secs: default_advisory_ttl(),
            group_ttl_secs: default_group_ttl(),
            protect_content: false,
        }
    }
}

impl DeliveryConfig {
    pub fn content_ttl(&self) -> Duration {
        Duration::from_secs(self.content_ttl_secs)
    }

    pub fn advisory_ttl(&self) -> Duration {
        Duration::from_secs(self.advisory_ttl_secs)
    }

    pub fn group_ttl(&self) -> Duration {
        Duration::from_secs(self.group_ttl_secs)
    }
}

/// Keep-alive web server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_port() -> u16 {
    8080
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "sqlite://vaultlink.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Third-party link unlocking (optional)
#[derive(Debug, Deserialize, Clone)]
pub struct UnlockConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_unlock_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_unlock_timeout")]
    pub timeout_secs: u64,
    /// Upper bound for re-uploading one staged file to the vault
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,
    /// Directory downloads are staged in before upload
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,
    /// Substrings that identify a supported link
    #[serde(default = "default_link_markers")]
    pub link_markers: Vec<String>,
}

fn default_unlock_url() -> String {
    "https://xapiverse.com/api/terabox-pro".to_string()
}

fn default_unlock_timeout() -> u64 {
    120
}

fn default_upload_timeout() -> u64 {
    900
}

fn default_staging_dir() -> String {
    "downloads".to_string()
}

fn default_link_markers() -> Vec<String> {
    vec!["terabox".to_string(), "1024tera".to_string()]
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: default_unlock_url(),
            api_key: String::new(),
            timeout_secs: default_unlock_timeout(),
            upload_timeout_secs: default_upload_timeout(),
            staging_dir: default_staging_dir(),
            link_markers: default_link_markers(),
        }
    }
}

impl UnlockConfig {
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

/// Log output settings
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

/// Root application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub unlock: UnlockConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default config file
            .add_source(File::with_name("config/default").required(false))
            // Override with local config if present
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (prefix: VAULTLINK_)
            // e.g., VAULTLINK_TELEGRAM__BOT_TOKEN, VAULTLINK_DELIVERY__CONTENT_TTL_SECS
            .add_source(
                Environment::with_prefix("VAULTLINK")
                    .separator("__")
                    .try_parsing(true),
            )
            // Hosting platforms hand out the listen port as a bare PORT variable
            .set_override_option("web.port", std::env::var("PORT").ok())?
            .build()?;

        config.try_deserialize()
    }

    /// Initialize the global config singleton
    pub fn init() -> Result<&'static Self, ConfigError> {
        let config = Self::load()?;
        Ok(CONFIG.get_or_init(|| config))
    }
}

impl TelegramConfig {
    /// Full URL of a Bot API method
    pub fn method_url(&self, method: &str) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/bot{}/{}", base, self.bot_token, method)
    }
}
