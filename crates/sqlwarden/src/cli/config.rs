//! Configuration file parsing
//!
//! Reads settings from `<home>/config.toml`. Every field has a default, so a
//! missing or partial file is valid. CLI flags override file values.

use serde::{Deserialize, Serialize};
use sqlwarden_db::{DbConfig, ExecutorConfig};
use sqlwarden_guard::{ValidatorConfig, DEFAULT_MAX_LIMIT};
use sqlwarden_mcp::server::DEFAULT_MAX_RESPONSE_BYTES;
use sqlwarden_mcp::{GatewayConfig, McpServerConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config not found at: {0}")]
    NotFound(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Default config file: `<home>/config.toml`
pub fn default_config_path() -> PathBuf {
    sqlwarden_logging::warden_home().join("config.toml")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WardenConfig {
    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewaySection {
    /// Row cap applied to every read
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,

    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,

    /// Largest page of audit history one call may return
    #[serde(default = "default_audit_history_max_limit")]
    pub audit_history_max_limit: u32,

    /// Tool results above this size are replaced by a truncation notice
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            max_limit: default_max_limit(),
            statement_timeout_ms: default_statement_timeout_ms(),
            audit_history_max_limit: default_audit_history_max_limit(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub verbose: bool,
}

fn default_database_path() -> PathBuf {
    sqlwarden_logging::warden_home().join("sqlwarden.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_max_limit() -> u64 {
    DEFAULT_MAX_LIMIT
}

fn default_statement_timeout_ms() -> u64 {
    30_000
}

fn default_audit_history_max_limit() -> u32 {
    sqlwarden_db::audit::MAX_HISTORY_LIMIT
}

fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database: Option<PathBuf>,
    pub max_limit: Option<u64>,
    pub statement_timeout_ms: Option<u64>,
    pub verbose: bool,
}

impl WardenConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    /// Load `path`. A missing file yields defaults unless `required`.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                if required {
                    Err(ConfigError::NotFound(path.display().to_string()))
                } else {
                    Ok(Self::default())
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn apply(&mut self, overrides: &Overrides) -> Result<()> {
        if let Some(path) = &overrides.database {
            self.database.path = path.clone();
        }
        if let Some(limit) = overrides.max_limit {
            self.gateway.max_limit = limit;
        }
        if let Some(ms) = overrides.statement_timeout_ms {
            self.gateway.statement_timeout_ms = ms;
        }
        self.logging.verbose |= overrides.verbose;
        self.check()
    }

    fn check(&self) -> Result<()> {
        if self.gateway.max_limit == 0 {
            return Err(ConfigError::Invalid("gateway.max_limit must be at least 1".into()));
        }
        if self.gateway.statement_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "gateway.statement_timeout_ms must be at least 1".into(),
            ));
        }
        if self.gateway.audit_history_max_limit == 0 {
            return Err(ConfigError::Invalid(
                "gateway.audit_history_max_limit must be at least 1".into(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::sqlite(&self.database.path)
            .with_max_connections(self.database.max_connections)
            .with_busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            validator: ValidatorConfig::new(self.gateway.max_limit),
            executor: ExecutorConfig::new(Duration::from_millis(self.gateway.statement_timeout_ms)),
            audit_history_max_limit: self.gateway.audit_history_max_limit,
        }
    }

    pub fn server_config(&self) -> McpServerConfig {
        McpServerConfig {
            max_response_bytes: self.gateway.max_response_bytes,
            ..McpServerConfig::default()
        }
    }
}

pub struct ConfigArgs {
    pub json: bool,
}

/// Print the resolved configuration.
pub fn run(config: &WardenConfig, args: ConfigArgs) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_is_defaults() {
        let config = WardenConfig::from_toml("").unwrap();
        assert_eq!(config.gateway.max_limit, 200);
        assert_eq!(config.gateway.statement_timeout_ms, 30_000);
        assert_eq!(config.gateway.audit_history_max_limit, 500);
        assert_eq!(config.gateway.max_response_bytes, 1024 * 1024);
        assert_eq!(config.database.max_connections, 5);
        assert!(!config.logging.verbose);
    }

    #[test]
    fn test_partial_file() {
        let config = WardenConfig::from_toml(
            r#"
            [database]
            path = "/tmp/warden.db"

            [gateway]
            max_limit = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.database.path, PathBuf::from("/tmp/warden.db"));
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert_eq!(config.gateway.max_limit, 50);
        assert_eq!(config.gateway.statement_timeout_ms, 30_000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            WardenConfig::from_toml("[gateway]\nmax_limit = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            WardenConfig::from_toml("[gateway]\nmax_limit = \"ten\"\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_overrides_win() {
        let mut config = WardenConfig::from_toml("[gateway]\nmax_limit = 50\n").unwrap();
        config
            .apply(&Overrides {
                database: Some(PathBuf::from("other.db")),
                max_limit: Some(10),
                statement_timeout_ms: Some(250),
                verbose: true,
            })
            .unwrap();
        assert_eq!(config.database.path, PathBuf::from("other.db"));
        assert_eq!(config.gateway_config().validator.max_limit, 10);
        assert_eq!(
            config.gateway_config().executor.statement_timeout,
            Duration::from_millis(250)
        );
        assert!(config.logging.verbose);

        let err = config.apply(&Overrides {
            max_limit: Some(0),
            ..Overrides::default()
        });
        assert!(err.is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        assert_eq!(WardenConfig::load(&path, false).unwrap(), WardenConfig::default());
        assert!(matches!(
            WardenConfig::load(&path, true),
            Err(ConfigError::NotFound(_))
        ));

        std::fs::write(&path, "[logging]\nverbose = true\n").unwrap();
        assert!(WardenConfig::load(&path, true).unwrap().logging.verbose);
    }

    #[test]
    fn test_serializes_back_to_toml() {
        let config = WardenConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(WardenConfig::from_toml(&text).unwrap(), config);
    }
}
