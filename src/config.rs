//! TOML configuration for the keep-alive service.
//!
//! Every section is optional and falls back to defaults. The file is found
//! through `--config`, then `KEEPALIVE_CONFIG`, then `./keepalive.toml`.
//! Environment variables are applied on top so secrets can stay out of the
//! file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::probes::platform::DEFAULT_API_URL;
use crate::runner::RunnerSettings;
use crate::scheduler::{KeepaliveSchedule, DEFAULT_CRON};
use crate::storage::history::DEFAULT_CAPACITY;

/// Config file looked up in the working directory when nothing else is given.
pub const LOCAL_CONFIG_FILE: &str = "keepalive.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeepaliveConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl KeepaliveConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded keepalive configuration");
        Ok(config)
    }

    /// Resolve configuration from, in order:
    /// 1. `explicit` (an error if it cannot be loaded).
    /// 2. The path in `KEEPALIVE_CONFIG`.
    /// 3. `./keepalive.toml`.
    /// 4. Compiled-in defaults.
    ///
    /// Environment overrides are applied and the result validated.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => Self::load_or_default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn load_or_default() -> Self {
        // 1. Environment variable override.
        if let Ok(env_path) = std::env::var("KEEPALIVE_CONFIG") {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "KEEPALIVE_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        // 2. Working directory.
        let local = Path::new(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %local.display(),
                        error = %e,
                        "local config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        // 3. Defaults.
        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    /// Apply `KEEPALIVE_*` overrides. Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("KEEPALIVE_TOKEN") {
            self.platform.token = Some(token);
        }
        if let Some(url) = get("KEEPALIVE_API_URL") {
            self.platform.api_url = url;
        }
        if let Some(url) = get("KEEPALIVE_APP_URL") {
            self.app.url = Some(url);
        }
        if let Some(path) = get("KEEPALIVE_DB") {
            self.history.db_path = PathBuf::from(path);
        }
        if let Some(bind) = get("KEEPALIVE_BIND") {
            self.server.bind = bind;
        }
        if let Some(cron) = get("KEEPALIVE_CRON") {
            self.schedule.cron = cron;
        }
    }

    /// Reject settings that would only fail later.
    pub fn validate(&self) -> Result<()> {
        if self.history.capacity == 0 {
            anyhow::bail!("history.capacity must be at least 1");
        }
        self.server
            .bind
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid server.bind address '{}'", self.server.bind))?;
        if self.schedule.enabled {
            KeepaliveSchedule::parse(&self.schedule.cron)?;
        }
        Ok(())
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            api_url: self.platform.api_url.clone(),
            token: self.platform.token.clone(),
            app_url: self.app.url.clone(),
            request_timeout: self.platform.request_timeout_secs.map(Duration::from_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// HTTP listener for the API and dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// The platform account being kept alive.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Account endpoint called with the bearer token.
    pub api_url: String,
    /// API token. Usually supplied through `KEEPALIVE_TOKEN`.
    pub token: Option<String>,
    /// Overall request timeout. Unset means no timeout.
    pub request_timeout_secs: Option<u64>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            request_timeout_secs: None,
        }
    }
}

// Keeps the token out of logs.
impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Optional application URL pinged after the platform check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Without history, runs are not recorded and `/api/logs` is empty.
    pub enabled: bool,
    pub db_path: PathBuf,
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: PathBuf::from("data/keepalive.db"),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    /// Cron expression, seconds field first.
    pub cron: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: DEFAULT_CRON.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = KeepaliveConfig::default();
        config.validate().unwrap();
        assert_eq!(config.platform.api_url, DEFAULT_API_URL);
        assert_eq!(config.history.capacity, 20);
        assert!(config.platform.token.is_none());
        assert!(config.app.url.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: KeepaliveConfig = toml::from_str(
            r#"
            [app]
            url = "https://my-app.example.com"

            [history]
            capacity = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.app.url.as_deref(), Some("https://my-app.example.com"));
        assert_eq!(config.history.capacity, 5);
        assert!(config.history.enabled);
        assert_eq!(config.schedule.cron, DEFAULT_CRON);
        assert_eq!(config.server.bind, "0.0.0.0:8080");
    }

    #[test]
    fn test_log_format_parses_lowercase() {
        let config: KeepaliveConfig = toml::from_str("[logging]\nformat = \"json\"\n").unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_env_overrides_win_and_blanks_are_ignored() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("KEEPALIVE_TOKEN", "from-env"),
            ("KEEPALIVE_APP_URL", "   "),
            ("KEEPALIVE_DB", "/tmp/ka.db"),
            ("KEEPALIVE_CRON", "0 */5 * * * *"),
        ]);

        let mut config = KeepaliveConfig::default();
        config.platform.token = Some("from-file".into());
        config.app.url = Some("https://kept.example.com".into());
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.platform.token.as_deref(), Some("from-env"));
        assert_eq!(config.app.url.as_deref(), Some("https://kept.example.com"));
        assert_eq!(config.history.db_path, PathBuf::from("/tmp/ka.db"));
        assert_eq!(config.schedule.cron, "0 */5 * * * *");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = KeepaliveConfig::default();
        config.history.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = KeepaliveConfig::default();
        config.schedule.cron = "not a cron".into();
        assert!(config.validate().is_err());

        config.schedule.enabled = false;
        config.validate().unwrap();

        config.server.bind = "localhost".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let mut config = KeepaliveConfig::default();
        config.platform.token = Some("super-secret".into());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keepalive.toml");
        std::fs::write(&path, "[platform]\ntoken = \"abc\"\nrequest_timeout_secs = 10\n").unwrap();

        let config = KeepaliveConfig::load(&path).unwrap();
        let settings = config.runner_settings();
        assert_eq!(settings.token.as_deref(), Some("abc"));
        assert_eq!(settings.request_timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_load_missing_file_errors() {
        assert!(KeepaliveConfig::load(Path::new("/nonexistent/keepalive.toml")).is_err());
    }
}
