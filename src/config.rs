//! Configuration management for safecase.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::{CheckpointPolicy, PipelineSettings};
use crate::scrapers::{BrowserEngineConfig, BrowserLauncher, FetcherLauncher, HttpLauncher, RateLimitConfig};
use crate::store::Store;

/// Listing page of the enforcement disclosure site.
pub const DEFAULT_LISTING_URL: &str =
    "http://www.safe.gov.cn/www/illegal/index?page={page}&siteid={site}";

/// Config file name prefer looks for.
const CONFIG_BASENAME: &str = "safecase";

/// Store subdirectory under the data directory.
const STORE_SUBDIR: &str = "safe";
/// Checkpoint subdirectory under the data directory.
const CHECKPOINT_SUBDIR: &str = "temp";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Which page source crawls use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetcherKind {
    /// Headless Chrome; renders JavaScript.
    Browser,
    /// Plain HTTP GET.
    Http,
}

impl Default for FetcherKind {
    fn default() -> Self {
        if cfg!(feature = "browser") {
            FetcherKind::Browser
        } else {
            FetcherKind::Http
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory. The store and checkpoints live below it.
    pub data_dir: PathBuf,
    /// Listing URL template with `{page}` and `{site}` placeholders.
    pub listing_url: String,
    /// User agent for HTTP requests (None = default, "impersonate" = random browser UA).
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Lower bound of the pause between requests, in milliseconds.
    pub min_delay_ms: u64,
    /// Upper bound of the pause between requests, in milliseconds.
    pub max_delay_ms: u64,
    /// Listing pages between summary checkpoints.
    pub summary_checkpoint_every: usize,
    /// Detail rows between detail checkpoints.
    pub detail_checkpoint_every: usize,
    pub fetcher: FetcherKind,
    pub browser: BrowserEngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        // Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("safecase");

        Self {
            data_dir,
            listing_url: DEFAULT_LISTING_URL.to_string(),
            user_agent: None,
            request_timeout: 30,
            min_delay_ms: 2_000,
            max_delay_ms: 20_000,
            summary_checkpoint_every: 2,
            detail_checkpoint_every: 10,
            fetcher: FetcherKind::default(),
            browser: BrowserEngineConfig::default(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join(STORE_SUBDIR)
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.data_dir.join(CHECKPOINT_SUBDIR)
    }

    pub fn store(&self) -> Store {
        Store::new(self.store_dir(), self.checkpoint_dir())
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.store_dir())?;
        std::fs::create_dir_all(self.checkpoint_dir())?;
        Ok(())
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig::from_millis(self.min_delay_ms, self.max_delay_ms)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            listing_url: self.listing_url.clone(),
            summary_checkpoint: CheckpointPolicy::new(self.summary_checkpoint_every),
            detail_checkpoint: CheckpointPolicy::new(self.detail_checkpoint_every),
        }
    }

    /// Launcher for the configured page source.
    pub fn launcher(&self) -> Arc<dyn FetcherLauncher> {
        match self.fetcher {
            FetcherKind::Browser => Arc::new(BrowserLauncher {
                config: self.browser.clone(),
            }),
            FetcherKind::Http => Arc::new(HttpLauncher {
                timeout: Duration::from_secs(self.request_timeout),
                user_agent: self.user_agent.clone(),
            }),
        }
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|s| !s.trim().is_empty());

        if let Some(dir) = var("SAFECASE_DATA_DIR") {
            tracing::debug!("Using SAFECASE_DATA_DIR from environment: {}", dir);
            self.data_dir = PathBuf::from(shellexpand::tilde(&dir).as_ref());
        }
        if let Some(ms) = var("SAFECASE_MIN_DELAY_MS").and_then(|v| v.trim().parse().ok()) {
            self.min_delay_ms = ms;
        }
        if let Some(ms) = var("SAFECASE_MAX_DELAY_MS").and_then(|v| v.trim().parse().ok()) {
            self.max_delay_ms = ms;
        }
        if let Some(url) = var("BROWSER_URL") {
            tracing::debug!("Using remote browser from BROWSER_URL: {}", url);
            self.browser.remote_url = Some(url);
        }
    }
}

/// Configuration file structure. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_checkpoint_every: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_checkpoint_every: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetcher: Option<FetcherKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserEngineConfig>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery of `safecase.*` files
    /// in the standard locations. Falls back to defaults when none is found
    /// or the discovered file does not parse.
    pub async fn load() -> Self {
        match prefer::load(CONFIG_BASENAME).await {
            Ok(found) => match found.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        tracing::warn!("Ignoring config file: {}", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(e) => {
                tracing::debug!("No config file found: {}", e);
                Self::default()
            }
        }
    }

    /// Load configuration from a specific file path.
    /// Format is chosen by extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_err = |reason: String| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        };

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).map_err(|e| parse_err(e.to_string()))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| parse_err(e.to_string()))?,
            _ => serde_json::from_str(&contents).map_err(|e| parse_err(e.to_string()))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved against `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref url) = self.listing_url {
            settings.listing_url = url.clone();
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(ms) = self.min_delay_ms {
            settings.min_delay_ms = ms;
        }
        if let Some(ms) = self.max_delay_ms {
            settings.max_delay_ms = ms;
        }
        if let Some(n) = self.summary_checkpoint_every {
            settings.summary_checkpoint_every = n;
        }
        if let Some(n) = self.detail_checkpoint_every {
            settings.detail_checkpoint_every = n;
        }
        if let Some(kind) = self.fetcher {
            settings.fetcher = kind;
        }
        if let Some(ref browser) = self.browser {
            settings.browser = browser.clone();
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory (--data flag), overrides config and environment.
    pub data: Option<PathBuf>,
}

/// Load settings with explicit options.
///
/// An explicitly named config file that cannot be read or parsed is an
/// error; otherwise the file is discovered with [`Config::load`].
pub async fn load_settings_with_options(
    options: LoadOptions,
) -> Result<(Settings, Config), ConfigError> {
    let config = match options.config_path {
        Some(ref path) => {
            let config = Config::load_from_path(path).await?;
            tracing::debug!("Loaded config from {}", path.display());
            config
        }
        None => Config::load().await,
    };

    let mut settings = Settings::default();
    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    config.apply_to_settings(&mut settings, &base_dir);

    settings.apply_env(|name| std::env::var(name).ok());

    if let Some(data) = options.data {
        settings.data_dir = data;
    }

    Ok((settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_by_extension() {
        let dir = tempdir().unwrap();

        let toml_path = dir.path().join("safecase.toml");
        std::fs::write(&toml_path, "min_delay_ms = 10\nfetcher = \"http\"\n[browser]\nheadless = false\n").unwrap();
        let config = Config::load_from_path(&toml_path).await.unwrap();
        assert_eq!(config.min_delay_ms, Some(10));
        assert_eq!(config.fetcher, Some(FetcherKind::Http));
        assert_eq!(config.browser.map(|b| b.headless), Some(false));

        let yaml_path = dir.path().join("safecase.yml");
        std::fs::write(&yaml_path, "max_delay_ms: 99\n").unwrap();
        let config = Config::load_from_path(&yaml_path).await.unwrap();
        assert_eq!(config.max_delay_ms, Some(99));

        let json_path = dir.path().join("safecase.json");
        std::fs::write(&json_path, r#"{"data_dir": "cases"}"#).unwrap();
        let config = Config::load_from_path(&json_path).await.unwrap();
        assert_eq!(config.base_dir().as_deref(), Some(dir.path()));
    }

    #[tokio::test]
    async fn test_parse_error_names_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("safecase.toml");
        std::fs::write(&path, "min_delay_ms = \"soon\"").unwrap();
        let err = Config::load_from_path(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("safecase.toml"));
    }

    #[tokio::test]
    async fn test_explicit_config_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.yaml");
        std::fs::write(&path, "listing_url: http://mirror.test/list?page={page}&siteid={site}\n").unwrap();

        let (settings, config) = load_settings_with_options(LoadOptions {
            config_path: Some(path.clone()),
            data: Some(dir.path().join("data")),
        })
        .await
        .unwrap();
        assert_eq!(config.source_path.as_deref(), Some(path.as_path()));
        assert_eq!(settings.listing_url, "http://mirror.test/list?page={page}&siteid={site}");
        assert_eq!(settings.data_dir, dir.path().join("data"));
    }

    #[tokio::test]
    async fn test_missing_explicit_config_is_an_error() {
        let dir = tempdir().unwrap();
        let err = load_settings_with_options(LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            data: None,
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_relative_data_dir_resolves_against_base() {
        let config = Config {
            data_dir: Some("cases".to_string()),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("/srv/app"));
        assert_eq!(settings.data_dir, PathBuf::from("/srv/app/cases"));
        assert_eq!(settings.store_dir(), PathBuf::from("/srv/app/cases/safe"));
        assert_eq!(settings.checkpoint_dir(), PathBuf::from("/srv/app/cases/temp"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SAFECASE_DATA_DIR", "/data/cases"),
            ("SAFECASE_MIN_DELAY_MS", "5"),
            ("SAFECASE_MAX_DELAY_MS", "not-a-number"),
            ("BROWSER_URL", "ws://localhost:9222"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_env(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(settings.data_dir, PathBuf::from("/data/cases"));
        assert_eq!(settings.min_delay_ms, 5);
        assert_eq!(settings.max_delay_ms, 20_000);
        assert_eq!(settings.browser.remote_url.as_deref(), Some("ws://localhost:9222"));
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.listing_url, DEFAULT_LISTING_URL);
        let pipeline = settings.pipeline_settings();
        assert_eq!(pipeline.summary_checkpoint.every(), 2);
        assert_eq!(pipeline.detail_checkpoint.every(), 10);
        let limits = settings.rate_limit_config();
        assert_eq!(limits.min_delay, Duration::from_secs(2));
        assert_eq!(limits.max_delay, Duration::from_secs(20));
    }
}
