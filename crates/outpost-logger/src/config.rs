//! Logger configuration and management

use crate::{
    policy::VolatilityPolicy,
    session::LogSession,
    sink::{ConsoleSink, NullSink, StdoutSink},
    Error, Result,
};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Log session configuration shared by every subsystem of the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Directory for log files
    pub log_dir: PathBuf,

    /// Volatility code: 0 hoarding, 1 anticonservative, 2 conservative, 3 minimal
    pub volatility: u8,

    /// Explicit bounds; take precedence over `volatility` when present
    pub custom: Option<PolicyBounds>,

    /// Mirror every log line to standard output
    pub console_mirror: bool,
}

/// Caller-supplied rotation and retention bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyBounds {
    pub max_files: u64,
    pub max_messages: u64,
    pub max_duration_seconds: u64,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let default_log_dir = Self::default_log_dir().unwrap_or_else(|_| PathBuf::from("./logs"));

        Self {
            log_dir: default_log_dir,
            volatility: 3,
            custom: None,
            console_mirror: true,
        }
    }
}

impl LoggerConfig {
    /// Load configuration from file or fall back to defaults plus env overrides
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        let mut config = if config_file.exists() {
            let content = tokio::fs::read_to_string(&config_file).await?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };

        config.load_env_overrides();
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config {
            message: format!("Failed to parse logger config: {}", e),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config_path: Option<&Path>) -> Result<()> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if let Some(parent) = config_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| Error::Config {
            message: format!("Failed to serialize logger config: {}", e),
        })?;

        tokio::fs::write(&config_file, content).await?;
        Ok(())
    }

    /// Apply `OUTPOST_LOG_*` environment variable overrides
    pub fn load_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("OUTPOST_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }

        if let Ok(code) = std::env::var("OUTPOST_LOG_VOLATILITY") {
            self.volatility = code.trim().parse().unwrap_or(self.volatility);
        }

        if let Ok(mirror) = std::env::var("OUTPOST_LOG_MIRROR") {
            self.console_mirror = mirror.trim().parse().unwrap_or(self.console_mirror);
        }
    }

    /// Resolve the configured bounds
    pub fn policy(&self) -> Result<VolatilityPolicy> {
        match self.custom {
            Some(bounds) => VolatilityPolicy::custom(
                bounds.max_files,
                bounds.max_messages,
                bounds.max_duration_seconds,
            ),
            None => VolatilityPolicy::from_code(self.volatility),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.policy()?;

        if self.log_dir.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "log_dir must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Open a session named `base_name` inside the configured log directory
    pub fn open_session(&self, base_name: &str) -> Result<LogSession> {
        let policy = self.policy()?;

        let sink: Box<dyn ConsoleSink> = if self.console_mirror {
            Box::new(StdoutSink)
        } else {
            Box::new(NullSink)
        };

        LogSession::builder(self.log_dir.join(base_name), policy)
            .boxed_sink(sink)
            .open()
    }

    fn default_config_path() -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("net", "outpost", "outpost").ok_or_else(|| Error::Config {
                message: "Could not determine config directory".to_string(),
            })?;

        Ok(project_dirs.config_dir().join("logger.toml"))
    }

    fn default_log_dir() -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("net", "outpost", "outpost").ok_or_else(|| Error::Config {
                message: "Could not determine log directory".to_string(),
            })?;

        Ok(project_dirs.data_dir().join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Volatility;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_default_is_minimal() {
        let config = LoggerConfig::default();
        assert_eq!(config.volatility, 3);
        assert_eq!(config.policy().unwrap(), VolatilityPolicy::minimal());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = LoggerConfig::from_toml(
            r#"
log_dir = "/tmp/outpost-logs"
volatility = 0
"#,
        )
        .unwrap();

        assert_eq!(config.log_dir, PathBuf::from("/tmp/outpost-logs"));
        assert_eq!(config.policy().unwrap(), VolatilityPolicy::hoarding());
        assert!(config.console_mirror);
    }

    #[test]
    fn test_custom_bounds_override_code() {
        let config = LoggerConfig::from_toml(
            r#"
volatility = 42

[custom]
max_files = 2
max_messages = 3
max_duration_seconds = 999999
"#,
        )
        .unwrap();

        let policy = config.policy().unwrap();
        assert_eq!(policy.volatility, Volatility::Custom);
        assert_eq!(policy.max_messages, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = LoggerConfig::default();
        config.volatility = 99;
        assert!(matches!(config.validate(), Err(Error::Config { .. })));

        config.volatility = 1;
        config.custom = Some(PolicyBounds {
            max_files: 0,
            max_messages: 10,
            max_duration_seconds: 10,
        });
        assert!(config.validate().is_err());

        config.custom = None;
        config.log_dir = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = LoggerConfig::from_toml("volatility = \"lots\"").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    #[serial]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("logger.toml");

        let mut original = LoggerConfig::default();
        original.log_dir = temp_dir.path().join("logs");
        original.volatility = 2;
        original.console_mirror = false;
        original.save(Some(&config_path)).await.unwrap();

        let loaded = LoggerConfig::load(Some(&config_path)).await.unwrap();
        assert_eq!(loaded.log_dir, original.log_dir);
        assert_eq!(loaded.volatility, 2);
        assert!(!loaded.console_mirror);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("OUTPOST_LOG_DIR", "/tmp/outpost-env-logs");
        std::env::set_var("OUTPOST_LOG_VOLATILITY", "1");
        std::env::set_var("OUTPOST_LOG_MIRROR", "not-a-bool");

        let mut config = LoggerConfig::default();
        config.load_env_overrides();

        assert_eq!(config.log_dir, PathBuf::from("/tmp/outpost-env-logs"));
        assert_eq!(config.policy().unwrap(), VolatilityPolicy::anticonservative());
        assert!(config.console_mirror);

        std::env::remove_var("OUTPOST_LOG_DIR");
        std::env::remove_var("OUTPOST_LOG_VOLATILITY");
        std::env::remove_var("OUTPOST_LOG_MIRROR");
    }

    #[test]
    fn test_open_session_in_log_dir() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = LoggerConfig::default();
        config.log_dir = temp_dir.path().join("logs");
        config.console_mirror = false;

        let session = config.open_session("rest_package").unwrap();
        assert!(session.current_path().starts_with(&config.log_dir));
        assert_eq!(session.policy(), &VolatilityPolicy::minimal());
    }

    #[test]
    fn test_open_session_rejects_unknown_code() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = LoggerConfig::default();
        config.log_dir = temp_dir.path().join("logs");
        config.volatility = 7;

        assert!(config.open_session("updater_package").is_err());
        assert!(!config.log_dir.exists());
    }
}
