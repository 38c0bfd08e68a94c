//! Configuration management for crawlstate using the prefer crate.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StoreError;
use crate::models::CategorySpec;
use crate::services::completion::{CompletionRules, PatternRule, SubcategoryPolicy};
use crate::utils::DomainFilter;

/// Default snapshot filename.
pub const DEFAULT_SNAPSHOT_FILENAME: &str = "crawl_state.json";

/// Default processed-URL log filename.
pub const DEFAULT_URL_LOG_FILENAME: &str = "processed_urls.txt";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "CRAWLSTATE_DATA_DIR";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding the snapshot and the URL log.
    pub data_dir: PathBuf,
    /// Snapshot filename inside `data_dir`.
    pub snapshot_filename: String,
    /// Processed-URL log filename inside `data_dir`.
    pub url_log_filename: String,
    /// Allow-list for recorded URLs (`host` or `host/path-prefix`).
    pub allowed_domains: Vec<String>,
    pub pattern_rule: PatternRule,
    /// Must be configured before any store is opened.
    pub subcategory_policy: Option<SubcategoryPolicy>,
    /// Categories and subcategories in crawl order.
    pub catalog: Vec<CategorySpec>,
}

impl Default for Settings {
    fn default() -> Self {
        // Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("crawlstate");

        Self {
            data_dir,
            snapshot_filename: DEFAULT_SNAPSHOT_FILENAME.to_string(),
            url_log_filename: DEFAULT_URL_LOG_FILENAME.to_string(),
            allowed_domains: Vec::new(),
            pattern_rule: PatternRule::default(),
            subcategory_policy: None,
            catalog: Vec::new(),
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

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot_filename)
    }

    pub fn url_log_path(&self) -> PathBuf {
        self.data_dir.join(&self.url_log_filename)
    }

    pub fn domain_filter(&self) -> DomainFilter {
        DomainFilter::new(&self.allowed_domains)
    }

    /// Completion rules for opening a store.
    ///
    /// The subcategory policy has no default and must come from configuration.
    pub fn completion_rules(&self) -> Result<CompletionRules, StoreError> {
        let policy = self.subcategory_policy.ok_or_else(|| {
            StoreError::Config(
                "no subcategory completion policy configured \
                 (set completion.subcategory to fixed_count or half_of_discovered)"
                    .to_string(),
            )
        })?;
        Ok(CompletionRules::new(self.pattern_rule, policy))
    }
}

/// Completion section of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<PatternRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<SubcategoryPolicy>,
}

impl CompletionConfig {
    pub fn is_default(&self) -> bool {
        self.pattern.is_none() && self.subcategory.is_none()
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Snapshot filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
    /// Processed-URL log filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_log: Option<String>,
    /// URL allow-list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_domains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "CompletionConfig::is_default")]
    pub completion: CompletionConfig,
    /// Category catalog in crawl order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<CategorySpec>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers crawlstate config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("crawlstate").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("{}", e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory of the config file, if it was loaded from one.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
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
        if let Some(ref snapshot) = self.snapshot {
            settings.snapshot_filename = snapshot.clone();
        }
        if let Some(ref url_log) = self.url_log {
            settings.url_log_filename = url_log.clone();
        }
        if let Some(ref domains) = self.allowed_domains {
            settings.allowed_domains = domains.clone();
        }
        if let Some(rule) = self.completion.pattern {
            settings.pattern_rule = rule;
        }
        if let Some(policy) = self.completion.subcategory {
            settings.subcategory_policy = Some(policy);
        }
        if !self.categories.is_empty() {
            settings.catalog = self.categories.clone();
        }
    }

    /// Compute SHA-256 hash of the serialized config.
    pub fn hash(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of config file directory.
    pub use_cwd: bool,
    /// Data directory (--data flag).
    pub data: Option<PathBuf>,
}

/// Look for a config file inside the data directory.
fn find_config_in_data_dir(data_dir: &Path) -> Option<PathBuf> {
    let extensions = ["json", "yaml", "yml", "toml"];
    let basenames = ["crawlstate", "config"];

    for basename in basenames {
        for ext in extensions {
            let path = data_dir.join(format!("{}.{}", basename, ext));
            if path.exists() {
                return Some(path);
            }
        }
    }
    None
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    }
}

/// Load config from file sources.
async fn load_file_config(options: &LoadOptions, data_dir_override: Option<&PathBuf>) -> Config {
    // Priority 1: Explicit --config flag
    if let Some(ref config_path) = options.config_path {
        return match Config::load_from_path(config_path).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}", e);
                Config::default()
            }
        };
    }

    // Priority 2: Config inside the data dir
    if let Some(data_dir) = data_dir_override {
        if let Some(config_path) = find_config_in_data_dir(data_dir) {
            tracing::debug!("Found config in data dir: {}", config_path.display());
            return match Config::load_from_path(&config_path).await {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("{}", e);
                    Config::default()
                }
            };
        }
    }

    // Priority 3: Auto-discover via prefer
    Config::load().await
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
///
/// Precedence for the data directory: --data flag, then `CRAWLSTATE_DATA_DIR`,
/// then the config file, then the platform default.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let env_data_dir = std::env::var(DATA_DIR_ENV)
        .ok()
        .filter(|s| !s.is_empty())
        .map(|s| absolute(Path::new(shellexpand::tilde(&s).as_ref())));

    let data_dir_override = options
        .data
        .as_ref()
        .map(|d| absolute(d))
        .or(env_data_dir);

    let config = load_file_config(&options, data_dir_override.as_ref()).await;

    let mut settings = Settings::default();

    let base_dir = if options.use_cwd {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    } else {
        config
            .base_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    };

    config.apply_to_settings(&mut settings, &base_dir);

    if let Some(data_dir) = data_dir_override {
        tracing::debug!("Using data dir override: {}", data_dir.display());
        settings.data_dir = data_dir;
    }

    (settings, config)
}
