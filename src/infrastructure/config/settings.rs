use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    /// Shared secret for the trigger endpoints; `None` leaves them open
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
    /// Apply the bundled schema migrations on startup
    #[serde(default)]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// "memory" or "postgres"
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// Upper bound for a single store call in milliseconds (0 = unbounded)
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Run the dispatch and seeding sweeps in-process
    #[serde(default = "default_true")]
    pub sweeps_enabled: bool,
    /// Seconds between dispatch sweeps
    #[serde(default = "default_dispatch_interval")]
    pub dispatch_interval_seconds: u64,
    /// Maximum notifications promoted per sweep
    #[serde(default = "default_dispatch_batch_size")]
    pub dispatch_batch_size: usize,
    /// Seconds between reminder seeding sweeps
    #[serde(default = "default_seed_interval")]
    pub seed_interval_seconds: u64,
    /// How far ahead the seeding sweep looks, in minutes
    #[serde(default = "default_seed_window")]
    pub seed_window_minutes: i64,
    /// Reminder lead time when neither the user nor the catalog sets one
    #[serde(default = "default_reminder_lead")]
    pub default_reminder_lead_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
    /// Emit JSON log lines instead of the human-readable format
    #[serde(default)]
    pub json_logs: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_database_url() -> String {
    "postgres://localhost:5432/counsel".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    300 // 5 minutes
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn default_call_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_dispatch_interval() -> u64 {
    60 // 1 minute
}

fn default_dispatch_batch_size() -> usize {
    100
}

fn default_seed_interval() -> u64 {
    300 // 5 minutes
}

fn default_seed_window() -> i64 {
    1440 // 24 hours
}

fn default_reminder_lead() -> i64 {
    60
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "counsel-notify".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8082)?
            .set_default("store.backend", "memory")?
            .set_default("engine.dispatch_interval_seconds", 60)?
            .set_default("engine.dispatch_batch_size", 100)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER__PORT, DATABASE__URL, STORE__BACKEND, API__KEY, etc.
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
            run_migrations: false,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweeps_enabled: true,
            dispatch_interval_seconds: default_dispatch_interval(),
            dispatch_batch_size: default_dispatch_batch_size(),
            seed_interval_seconds: default_seed_interval(),
            seed_window_minutes: default_seed_window(),
            default_reminder_lead_minutes: default_reminder_lead(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
            json_logs: false,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            api: ApiConfig::default(),
            database: DatabaseConfig::default(),
            store: StoreConfig::default(),
            engine: EngineConfig::default(),
            otel: OtelConfig::default(),
        }
    }
}
