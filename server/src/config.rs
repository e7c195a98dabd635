//! Server configuration. Values come from a YAML file when one is given,
//! then environment variables, then command-line flags, each layer
//! overriding the one before it.

use std::env;
use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_yaml2 as serde_yaml;

use storage::{StorageConfig, StorageKind};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_RATE_LIMIT: u32 = 60;

#[derive(Debug, Parser)]
#[command(name = "portal_server", about = "AfyaLink insurance portal API server")]
pub struct CliArgs {
    /// Path to a YAML configuration file.
    #[arg(long)]
    pub config: Option<String>,
    /// Port to listen on; overrides file and environment.
    #[arg(long)]
    pub port: Option<u16>,
    /// Storage backend: "postgres" or "memory".
    #[arg(long)]
    pub storage: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageConfig,
    /// Requests allowed per client IP per minute.
    pub rate_limit_per_minute: u32,
    /// When set, a ready-made admin session is written at startup under
    /// this token. Local development only.
    pub bootstrap_admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            storage: StorageConfig::default(),
            rate_limit_per_minute: DEFAULT_RATE_LIMIT,
            bootstrap_admin_token: None,
        }
    }
}

impl ServerConfig {
    /// Loads the effective configuration: YAML file (if any), then
    /// environment, then CLI flags.
    pub fn load(args: &CliArgs) -> Result<Self> {
        let mut config = match args.config.as_deref() {
            Some(path) => {
                let content = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path))?;
                serde_yaml::from_str(&content)
                    .with_context(|| format!("failed to parse config file {}", path))?
            }
            None => ServerConfig::default(),
        };
        config.apply_env();
        config.apply_cli(args)?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(host) = env::var("PORTAL_HOST") {
            self.host = host;
        }
        if let Ok(port) = env::var("PORTAL_PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        if let Ok(kind) = env::var("PORTAL_STORAGE") {
            if let Some(kind) = parse_storage_kind(&kind) {
                self.storage.kind = kind;
            }
        }
        if let Ok(dsn) = env::var("PORTAL_DATABASE_URL") {
            self.storage.connection_string = Some(dsn);
        }
        if let Ok(url) = env::var("PORTAL_REDIS_URL") {
            self.storage.redis_url = Some(url);
        }
        if let Ok(token) = env::var("PORTAL_BOOTSTRAP_ADMIN_TOKEN") {
            self.bootstrap_admin_token = Some(token);
        }
    }

    fn apply_cli(&mut self, args: &CliArgs) -> Result<()> {
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(kind) = args.storage.as_deref() {
            self.storage.kind = parse_storage_kind(kind)
                .with_context(|| format!("unknown storage backend {:?}", kind))?;
        }
        Ok(())
    }
}

fn parse_storage_kind(value: &str) -> Option<StorageKind> {
    match value.to_ascii_lowercase().as_str() {
        "postgres" => Some(StorageKind::Postgres),
        "memory" => Some(StorageKind::Memory),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_storage_kind, CliArgs, ServerConfig};
    use storage::StorageKind;

    #[test]
    fn should_default_to_memory_storage_on_port_8080() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.storage.kind, StorageKind::Memory);
        assert_eq!(config.rate_limit_per_minute, 60);
    }

    #[test]
    fn should_let_cli_flags_win_over_defaults() {
        let args = CliArgs {
            config: None,
            port: Some(9100),
            storage: Some("postgres".to_string()),
        };
        let mut config = ServerConfig::default();
        config.apply_cli(&args).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.storage.kind, StorageKind::Postgres);
    }

    #[test]
    fn should_reject_unknown_storage_backend() {
        assert!(parse_storage_kind("sled").is_none());
        let args = CliArgs {
            config: None,
            port: None,
            storage: Some("sled".to_string()),
        };
        assert!(ServerConfig::default().apply_cli(&args).is_err());
    }

    #[test]
    fn should_parse_yaml_config() {
        let yaml = r#"
host: "127.0.0.1"
port: 9000
rate_limit_per_minute: 10
storage:
  kind: memory
  connection_string: null
  redis_url: null
"#;
        let config: ServerConfig = serde_yaml2::from_str(yaml).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.rate_limit_per_minute, 10);
    }
}
