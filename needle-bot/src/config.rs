//! Bot configuration.
//!
//! Stored as JSON at `~/.needle/config.json`. Missing fields take their
//! defaults, so an empty object is a valid configuration.

use crate::error::{ConfigError, ConfigResult, ErrorContext, Result};
use crate::util::{config_dir, data_dir};
use needle::engine::EngineConfig;
use needle::error::EngineResult;
use needle::flow::{DEFAULT_PRIORITY, FlowRegistry, FlowType};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Environment variable overriding the Telegram token.
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "NEEDLE_DATA_DIR";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Telegram channel.
    pub telegram: TelegramConfig,
    /// Record storage.
    pub storage: StorageConfig,
    /// Dialog engine.
    pub dialog: DialogConfig,
    /// Terminal channel.
    pub cli: CliConfig,
}

/// Telegram channel settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Whether the channel runs.
    pub enabled: bool,
    /// Bot token from @BotFather.
    pub token: String,
    /// User ids allowed to talk to the bot. Empty allows everyone.
    pub allow_from: Vec<i64>,
}

/// Record storage settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory of the per-owner record files. Defaults to `~/.needle/data`.
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// The configured directory or the default one.
    #[must_use]
    pub fn resolved_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(data_dir)
    }
}

/// Dialog engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogConfig {
    /// Idle seconds after which a session is discarded. `None` keeps sessions
    /// until they finish or are cancelled.
    pub session_ttl_secs: Option<u64>,
    /// Declared interpreter order. Must list every flow once; with one
    /// session per owner it does not change which flow handles an event.
    pub priority: Vec<FlowType>,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: None,
            priority: DEFAULT_PRIORITY.to_vec(),
        }
    }
}

impl DialogConfig {
    /// Engine settings derived from this section.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        let config = EngineConfig::default();
        match self.session_ttl_secs {
            Some(secs) => config.with_session_ttl(Duration::from_secs(secs)),
            None => config,
        }
    }

    /// The standard flows ordered by `priority`.
    ///
    /// # Errors
    ///
    /// Fails if `priority` does not name every flow exactly once.
    pub fn registry(&self) -> EngineResult<FlowRegistry> {
        FlowRegistry::standard().with_priority(self.priority.clone())
    }
}

/// Terminal channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Input prompt.
    pub prompt: String,
    /// Owner id the terminal user acts as.
    pub owner_id: i64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            prompt: "> ".to_string(),
            owner_id: 1,
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Severity of a [`ConfigIssue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    /// The bot cannot run with this configuration.
    Error,
    /// Suspicious but usable.
    Warning,
}

/// One problem found by [`BotConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Severity.
    pub level: IssueLevel,
    /// Human readable description.
    pub message: String,
}

impl ConfigIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            message: message.into(),
        }
    }
}

impl BotConfig {
    /// Check the configuration for problems.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.telegram.enabled {
            if self.telegram.token.trim().is_empty() {
                issues.push(ConfigIssue::error(
                    "telegram is enabled but no token is set",
                ));
            }
            if self.telegram.allow_from.is_empty() {
                issues.push(ConfigIssue::warning(
                    "telegram.allow_from is empty, anyone can use the bot",
                ));
            }
        }

        let priority = &self.dialog.priority;
        if priority.is_empty() {
            issues.push(ConfigIssue::error("dialog.priority is empty"));
        } else {
            for (i, flow) in priority.iter().enumerate() {
                if priority[..i].contains(flow) {
                    issues.push(ConfigIssue::error(format!(
                        "dialog.priority lists {flow} twice"
                    )));
                }
            }
            for flow in FlowType::ALL {
                if !priority.contains(&flow) {
                    issues.push(ConfigIssue::error(format!(
                        "dialog.priority is missing {flow}"
                    )));
                }
            }
        }

        if self.dialog.session_ttl_secs == Some(0) {
            issues.push(ConfigIssue::error("dialog.session_ttl_secs must be positive"));
        }

        issues
    }

    /// Whether [`validate`](Self::validate) reports any error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.validate()
            .iter()
            .any(|issue| issue.level == IssueLevel::Error)
    }

    /// Apply environment overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var(TOKEN_ENV)
            && !token.trim().is_empty()
        {
            self.telegram.token = token;
        }
        if let Ok(dir) = std::env::var(DATA_DIR_ENV)
            && !dir.trim().is_empty()
        {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }
        self
    }
}

// ============================================================================
// Loading and Saving
// ============================================================================

/// Default location of the configuration file.
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load the configuration from the default location.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub async fn load_config() -> ConfigResult<BotConfig> {
    load_config_from(&config_path()).await
}

/// Load the configuration from `path`, falling back to defaults when the file
/// does not exist. Environment overrides are applied.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub async fn load_config_from(path: &Path) -> ConfigResult<BotConfig> {
    let config = match tokio::fs::read_to_string(path).await {
        Ok(content) => serde_json::from_str(&content)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file, using defaults");
            BotConfig::default()
        }
        Err(e) => return Err(e.into()),
    };
    Ok(config.with_env_overrides())
}

/// Load the configuration from `path` and reject it when
/// [`BotConfig::validate`] reports errors. Every issue is logged.
///
/// # Errors
///
/// Fails if the file cannot be loaded or the configuration has errors.
pub async fn load_validated(path: &Path) -> Result<BotConfig> {
    let config = load_config_from(path)
        .await
        .with_context(|| format!("failed to load {}", path.display()))?;

    let mut errors = Vec::new();
    for issue in config.validate() {
        match issue.level {
            IssueLevel::Error => {
                error!(path = %path.display(), "{}", issue.message);
                errors.push(issue.message);
            }
            IssueLevel::Warning => warn!(path = %path.display(), "{}", issue.message),
        }
    }
    if !errors.is_empty() {
        return Err(ConfigError::invalid(errors.join("; ")).into());
    }
    Ok(config)
}

/// Write `config` to `path`, creating parent directories.
///
/// # Errors
///
/// Fails on IO or serialization errors.
pub async fn save_config_to(config: &BotConfig, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path, content).await?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

/// Write `config` to the default location.
///
/// # Errors
///
/// Fails on IO or serialization errors.
pub async fn save_config(config: &BotConfig) -> ConfigResult<()> {
    save_config_to(config, &config_path()).await
}

/// Write a default configuration to `path` and create the data directory.
///
/// # Errors
///
/// Fails on IO errors.
pub async fn init_config_at(path: &Path) -> ConfigResult<BotConfig> {
    let config = BotConfig::default();
    save_config_to(&config, path).await?;
    tokio::fs::create_dir_all(config.storage.resolved_dir())
        .await
        .map_err(|e| ConfigError::invalid(format!("cannot create data directory: {e}")))?;
    Ok(config)
}

/// Write a default configuration to the default location.
///
/// # Errors
///
/// Fails on IO errors.
pub async fn init_config() -> ConfigResult<BotConfig> {
    init_config_at(&config_path()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;

    #[test]
    fn test_default_config_is_valid() {
        let config = BotConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.dialog.priority, DEFAULT_PRIORITY.to_vec());
        assert!(config.dialog.registry().is_ok());
        assert_eq!(config.dialog.engine_config(), EngineConfig::default());
    }

    #[test]
    fn test_empty_object_parses_to_defaults() {
        let config: BotConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BotConfig::default());
    }

    #[test]
    fn test_priority_parses_snake_case_flow_names() {
        let json = r#"{"dialog": {"priority": ["add_entry", "add_plan"], "session_ttl_secs": 600}}"#;
        let config: BotConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.dialog.priority,
            vec![FlowType::AddEntry, FlowType::AddPlan]
        );
        assert_eq!(
            config.dialog.engine_config().session_ttl,
            Some(Duration::from_secs(600))
        );
        // Five flows are missing.
        assert_eq!(config.validate().len(), 5);
        assert!(config.dialog.registry().is_err());
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut config = BotConfig::default();
        config.telegram.enabled = true;
        config.dialog.session_ttl_secs = Some(0);
        config.dialog.priority.push(FlowType::AddNote);

        let issues = config.validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|i| i.level == IssueLevel::Error)
            .map(|i| i.message.as_str())
            .collect();
        assert_eq!(
            errors,
            vec![
                "telegram is enabled but no token is set",
                "dialog.priority lists add_note twice",
                "dialog.session_ttl_secs must be positive",
            ]
        );
        assert!(
            issues
                .iter()
                .any(|i| i.level == IssueLevel::Warning && i.message.contains("allow_from"))
        );
        assert!(config.has_errors());

        config.dialog.priority.clear();
        assert!(
            config
                .validate()
                .iter()
                .any(|i| i.message == "dialog.priority is empty")
        );
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = BotConfig::default();
        config.telegram.allow_from = vec![42];
        config.cli.owner_id = 7;
        config.storage.data_dir = Some(dir.path().join("data"));
        save_config_to(&config, &path).await.unwrap();

        let loaded = load_config_from(&path).await.unwrap();
        assert_eq!(loaded.telegram.allow_from, vec![42]);
        assert_eq!(loaded.cli.owner_id, 7);
    }

    #[tokio::test]
    async fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.json"))
            .await
            .unwrap();
        assert_eq!(config.dialog, DialogConfig::default());
    }

    #[tokio::test]
    async fn test_load_validated_names_the_file_and_the_problems() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        tokio::fs::write(&path, "{ not json").await.unwrap();
        let err = load_validated(&path).await.unwrap_err();
        assert!(matches!(&err, BotError::Internal(msg)
            if msg.starts_with(&format!("failed to load {}", path.display()))));

        tokio::fs::write(&path, r#"{"dialog": {"priority": [], "session_ttl_secs": 0}}"#)
            .await
            .unwrap();
        let err = load_validated(&path).await.unwrap_err();
        assert!(matches!(&err, BotError::Config(ConfigError::Invalid(msg))
            if msg == "dialog.priority is empty; dialog.session_ttl_secs must be positive"));

        tokio::fs::write(&path, "{}").await.unwrap();
        assert_eq!(
            load_validated(&path).await.unwrap().dialog,
            DialogConfig::default()
        );
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();
        assert!(matches!(
            load_config_from(&path).await,
            Err(ConfigError::Parse(_))
        ));
    }
}
