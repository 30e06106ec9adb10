use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 18789;
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Top-level config (agentfleet.toml + AGENTFLEET_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub webhooks: WebhooksConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub cli: CliConfig,
    #[serde(default)]
    pub tool: ToolConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub tenants: TenantsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    pub whatsapp: Option<WhatsappConfig>,
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsappConfig {
    pub phone_number_id: String,
    pub access_token: String,
    pub verify_token: String,
    pub app_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
}

/// Authentication mode for an incoming webhook source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WebhookAuthMode {
    /// HMAC-SHA256 over the raw request body (GitHub-style X-Hub-Signature-256).
    HmacSha256,
    /// Static bearer token in the Authorization header.
    BearerToken,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSourceConfig {
    /// Identifier used in the route, e.g. "whatsapp" → POST /webhooks/whatsapp.
    pub name: String,
    pub secret: Option<String>,
    pub auth_mode: WebhookAuthMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebhooksConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub sources: Vec<WebhookSourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle conversation session expiry, in hours. Default 24.
    #[serde(default = "default_idle_hours")]
    pub idle_hours: u64,
    /// Lease TTL, in seconds. Default 300.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_hours: default_idle_hours(),
            lease_ttl_secs: default_lease_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default = "default_cli_timeout_ms")]
    pub timeout_ms: u64,
    /// Executable spawned for each tenant's CLI agent session.
    #[serde(default = "default_cli_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_cli_timeout_ms(),
            command: default_cli_command(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default = "default_tool_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_tool_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_tool_output_cap_bytes")]
    pub output_cap_bytes: usize,
    #[serde(default = "default_manifest_cache_ttl_secs")]
    pub manifest_cache_ttl_secs: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_tool_timeout_ms(),
            concurrency: default_tool_concurrency(),
            output_cap_bytes: default_tool_output_cap_bytes(),
            manifest_cache_ttl_secs: default_manifest_cache_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_browser_max_per_tenant")]
    pub max_per_tenant: usize,
    #[serde(default = "default_browser_idle_ttl_ms")]
    pub idle_ttl_ms: u64,
    #[serde(default = "default_browser_persist_ttl_ms")]
    pub persist_ttl_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            max_per_tenant: default_browser_max_per_tenant(),
            idle_ttl_ms: default_browser_idle_ttl_ms(),
            persist_ttl_ms: default_browser_persist_ttl_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
    #[serde(default = "default_scheduler_tick_secs")]
    pub tick_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_scheduler_batch_size(),
            lease_ttl_secs: default_lease_ttl_secs(),
            tick_secs: default_scheduler_tick_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CredentialsConfig {
    /// Base64-encoded 32-byte AES-256-GCM key. Resolved once at startup.
    pub encryption_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantsConfig {
    /// Filesystem root under which each tenant gets `<root_dir>/<tenant_id>/`.
    #[serde(default = "default_tenants_root_dir")]
    pub root_dir: String,
}

impl Default for TenantsConfig {
    fn default() -> Self {
        Self {
            root_dir: default_tenants_root_dir(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.agentfleet/agentfleet.db", home)
}
fn default_idle_hours() -> u64 {
    24
}
fn default_lease_ttl_secs() -> u64 {
    300
}
fn default_cli_timeout_ms() -> u64 {
    120_000
}
fn default_cli_command() -> String {
    "agentfleet-cli-agent".to_string()
}
fn default_tool_timeout_ms() -> u64 {
    30_000
}
fn default_tool_concurrency() -> usize {
    10
}
fn default_tool_output_cap_bytes() -> usize {
    1024 * 1024
}
fn default_manifest_cache_ttl_secs() -> u64 {
    300
}
fn default_browser_max_per_tenant() -> usize {
    5
}
fn default_browser_idle_ttl_ms() -> u64 {
    30 * 60 * 1000
}
fn default_browser_persist_ttl_ms() -> u64 {
    24 * 60 * 60 * 1000
}
fn default_scheduler_batch_size() -> usize {
    20
}
fn default_scheduler_tick_secs() -> u64 {
    10
}
fn default_tenants_root_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.agentfleet/tenants", home)
}

impl AppConfig {
    /// Load config from a TOML file with AGENTFLEET_* env var overrides.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: AppConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("AGENTFLEET_").split("_"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.agentfleet/agentfleet.toml", home)
}
