use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;
use config::File;
use config::FileFormat;
use serde::{Deserialize, Serialize};
use std::process::exit;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config/ferry.yaml";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
    pub logging: Option<LoggingConfig>,
}

impl AppConfig {
    pub fn load_config() -> Self {
        match Self::load_config_with_error() {
            Ok(app_config) => app_config,
            Err(err) => {
                println!("Load error :{}", err);
                exit(1);
            }
        }
    }
    pub fn load_config_with_error() -> Result<Self, anyhow::Error> {
        dotenv::dotenv().ok();
        let path = std::env::var("FERRY_CONFIG").unwrap_or(DEFAULT_CONFIG_PATH.to_string());

        let mut builder = ConfigBuilder::<DefaultState>::default();
        builder = builder.add_source(File::new(&path, FileFormat::Yaml).required(false));
        builder = builder.add_source(Environment::with_prefix("APP").separator("__"));

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

/// Metadata store holding data sources and migration tasks.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}
fn default_database_url() -> String {
    "sqlite://./data_transfer.db".to_string()
}
fn default_max_connections() -> u32 {
    5
}
fn default_acquire_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MigrationConfig {
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}
impl MigrationConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            task_timeout_secs: default_task_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}
fn default_max_concurrent_tasks() -> usize {
    3
}
fn default_task_timeout_secs() -> u64 {
    3600
}
fn default_connect_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LoggingConfig {
    pub console: Option<bool>,
    pub level: Option<String>,
    pub dir: Option<String>,
}
