//! Configuration file parser for ~/.config/feedline/config.toml.
//!
//! The config file is optional: a missing or empty file yields
//! `Config::default()`. Unknown keys are accepted by serde but logged, since
//! they are usually typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::background::Connectivity;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// Every section uses `#[serde(default)]` so any subset of keys can be given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file. Defaults to `feedline.db` in the config directory.
    pub database_path: Option<PathBuf>,
    pub http: HttpConfig,
    pub refresh: RefreshConfig,
    pub background: BackgroundConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout, body included.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    /// Responses larger than this are rejected.
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 30,
            user_agent: concat!("feedline/", env!("CARGO_PKG_VERSION")).to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Feeds fetched at once by a foreground refresh.
    pub concurrency: usize,
    /// Feeds fetched at once by the background job.
    pub background_concurrency: usize,
    /// Upper bound on feeds per background run.
    pub background_max_feeds: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            background_concurrency: 5,
            background_max_feeds: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Values below one minute are treated as one minute.
    pub interval_minutes: u64,
    /// A run may start this much before the interval elapses.
    pub flex_minutes: u64,
    /// Backoff floor after a run asks to be retried.
    pub min_backoff_secs: u64,
    /// Network type reported to the background job (no OS probe).
    pub connectivity: Connectivity,
    pub battery_low: bool,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 15,
            flex_minutes: 5,
            min_backoff_secs: 10,
            connectivity: Connectivity::Wifi,
            battery_low: false,
        }
    }
}

const KNOWN_KEYS: &[(&str, &[&str])] = &[
    ("database_path", &[]),
    (
        "http",
        &["timeout_secs", "connect_timeout_secs", "user_agent", "max_body_bytes"],
    ),
    (
        "refresh",
        &["concurrency", "background_concurrency", "background_max_feeds"],
    ),
    (
        "background",
        &[
            "interval_minutes",
            "flex_minutes",
            "min_backoff_secs",
            "connectivity",
            "battery_low",
        ],
    ),
];

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    for (key, value) in raw {
        let Some((_, section_keys)) = KNOWN_KEYS.iter().find(|(k, _)| k == key) else {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            continue;
        };
        if let Some(table) = value.as_table() {
            for sub in table.keys() {
                if !section_keys.contains(&sub.as_str()) {
                    tracing::warn!(key = %format!("{}.{}", key, sub), "Unknown key in config file, ignoring");
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_config(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("feedline_config_test_{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database_path, None);
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.http.connect_timeout_secs, 30);
        assert_eq!(config.http.max_body_bytes, 10 * 1024 * 1024);
        assert!(config.http.user_agent.starts_with("feedline/"));
        assert_eq!(config.refresh, RefreshConfig::default());
        assert_eq!(config.refresh.concurrency, 8);
        assert_eq!(config.refresh.background_concurrency, 5);
        assert_eq!(config.refresh.background_max_feeds, 10);
        assert_eq!(config.background.interval_minutes, 15);
        assert_eq!(config.background.flex_minutes, 5);
        assert_eq!(config.background.min_backoff_secs, 10);
        assert_eq!(config.background.connectivity, Connectivity::Wifi);
        assert!(!config.background.battery_low);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedline_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.refresh.concurrency, 8);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let path = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.http, HttpConfig::default());
        cleanup(&path);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let path = write_config("partial", "[refresh]\nconcurrency = 2\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.refresh.concurrency, 2);
        assert_eq!(config.refresh.background_concurrency, 5);
        assert_eq!(config.background, BackgroundConfig::default());
        cleanup(&path);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
database_path = "/var/lib/feedline/feeds.db"

[http]
timeout_secs = 10
connect_timeout_secs = 5
user_agent = "test-agent"
max_body_bytes = 1024

[refresh]
concurrency = 4
background_concurrency = 2
background_max_feeds = 20

[background]
interval_minutes = 60
flex_minutes = 10
min_backoff_secs = 30
connectivity = "cellular"
battery_low = true
"#;
        let path = write_config("full", content);
        let config = Config::load(&path).unwrap();

        assert_eq!(
            config.database_path,
            Some(PathBuf::from("/var/lib/feedline/feeds.db"))
        );
        assert_eq!(
            config.http,
            HttpConfig {
                timeout_secs: 10,
                connect_timeout_secs: 5,
                user_agent: "test-agent".to_string(),
                max_body_bytes: 1024,
            }
        );
        assert_eq!(config.refresh.background_max_feeds, 20);
        assert_eq!(
            config.background,
            BackgroundConfig {
                interval_minutes: 60,
                flex_minutes: 10,
                min_backoff_secs: 30,
                connectivity: Connectivity::Cellular,
                battery_low: true,
            }
        );
        cleanup(&path);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let path = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        cleanup(&path);
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let path = write_config(
            "unknown",
            "totally_fake_key = 1\n[refresh]\nconcurency = 3\n",
        );
        let config = Config::load(&path).unwrap();
        assert_eq!(config.refresh.concurrency, 8);
        cleanup(&path);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let path = write_config("wrongtype", "[refresh]\nconcurrency = \"many\"\n");
        assert!(Config::load(&path).is_err());
        cleanup(&path);
    }

    #[test]
    fn test_unknown_connectivity_rejected() {
        let path = write_config("connectivity", "[background]\nconnectivity = \"satellite\"\n");
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
        cleanup(&path);
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let path = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        cleanup(&path);
    }
}
