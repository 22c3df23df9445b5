use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::cache::{DEFAULT_SWEEP_SECS, DEFAULT_TTL_SECS};
use crate::limiter::{DEFAULT_TOKENS_PER_INTERVAL, IntervalUnit};

/// Environment variable consulted when no API key is stored on disk.
pub const API_KEY_ENV: &str = "WUNDERGROUND_API_KEY";

/// `[cache]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_sweep_secs")]
    pub sweep_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            sweep_secs: DEFAULT_SWEEP_SECS,
        }
    }
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL_SECS
}

fn default_sweep_secs() -> u64 {
    DEFAULT_SWEEP_SECS
}

/// `[limit]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitConfig {
    #[serde(default = "default_tokens")]
    pub tokens: u32,
    #[serde(default)]
    pub interval: IntervalUnit,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            tokens: DEFAULT_TOKENS_PER_INTERVAL,
            interval: IntervalUnit::Minute,
        }
    }
}

fn default_tokens() -> u32 {
    DEFAULT_TOKENS_PER_INTERVAL
}

fn env_api_key() -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|key| !key.is_empty())
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// debug = false
///
/// [cache]
/// ttl_secs = 300
/// sweep_secs = 30
///
/// [limit]
/// tokens = 10
/// interval = "minute"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub api_key: Option<String>,

    /// Override of the provider root, mostly for proxies and tests.
    pub base_url: Option<String>,

    #[serde(default)]
    pub debug: bool,

    /// Response caching; absent means disabled.
    pub cache: Option<CacheConfig>,

    /// Request throttling; absent means disabled.
    pub limit: Option<LimitConfig>,
}

impl Config {
    /// API key from the file, falling back to `WUNDERGROUND_API_KEY`.
    pub fn effective_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(env_api_key)
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("com", "wunderground", "wunderground-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Runs `f` with `WUNDERGROUND_API_KEY` set, restoring the previous value after.
    fn with_env_key<T>(value: &str, f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let previous = std::env::var(API_KEY_ENV).ok();
        // SAFETY: env access in this module is serialised by ENV_LOCK.
        unsafe { std::env::set_var(API_KEY_ENV, value) };

        let out = f();

        match previous {
            Some(prev) => unsafe { std::env::set_var(API_KEY_ENV, prev) },
            None => unsafe { std::env::remove_var(API_KEY_ENV) },
        }
        out
    }

    #[test]
    fn default_is_unconfigured() {
        let cfg = Config::default();
        assert!(!cfg.is_configured());
        assert!(cfg.cache.is_none());
        assert!(cfg.limit.is_none());
    }

    #[test]
    fn stored_key_wins() {
        let mut cfg = Config::default();
        cfg.set_api_key("FILE_KEY".into());

        assert!(cfg.is_configured());
        assert_eq!(cfg.effective_api_key().as_deref(), Some("FILE_KEY"));
    }

    #[test]
    fn env_key_used_when_file_has_none() {
        let cfg = Config::default();
        let key = with_env_key("ENV_KEY", || cfg.effective_api_key());
        assert_eq!(key.as_deref(), Some("ENV_KEY"));
    }

    #[test]
    fn env_key_used_when_file_key_is_empty() {
        let mut cfg = Config::default();
        cfg.set_api_key(String::new());

        let key = with_env_key("ENV_KEY", || cfg.effective_api_key());
        assert_eq!(key.as_deref(), Some("ENV_KEY"));
        assert!(!cfg.is_configured());
    }

    #[test]
    fn file_key_wins_over_env() {
        let mut cfg = Config::default();
        cfg.set_api_key("FILE_KEY".into());

        let key = with_env_key("ENV_KEY", || cfg.effective_api_key());
        assert_eq!(key.as_deref(), Some("FILE_KEY"));
    }

    #[test]
    fn empty_key_is_not_configured() {
        let mut cfg = Config::default();
        cfg.set_api_key(String::new());
        assert!(!cfg.is_configured());
    }

    #[test]
    fn missing_tables_fields_take_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            api_key = "KEY"

            [cache]

            [limit]
            interval = "hour"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.cache, Some(CacheConfig::default()));
        assert_eq!(
            cfg.limit,
            Some(LimitConfig {
                tokens: DEFAULT_TOKENS_PER_INTERVAL,
                interval: IntervalUnit::Hour,
            })
        );
        assert!(!cfg.debug);
    }

    #[test]
    fn save_and_load_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let cfg = Config {
            api_key: Some("KEY".into()),
            base_url: None,
            debug: true,
            cache: Some(CacheConfig {
                ttl_secs: 60,
                sweep_secs: 10,
            }),
            limit: Some(LimitConfig {
                tokens: 3,
                interval: IntervalUnit::Second,
            }),
        };
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_key = [").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
