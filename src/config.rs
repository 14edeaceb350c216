use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "coinledger.toml";

fn default_display_currency() -> String {
    "jpy".to_string()
}

/// Reference zone for "today" and for naive period bounds.
fn default_timezone() -> Tz {
    chrono_tz::Asia::Tokyo
}

/// Price feed and cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceConfig {
    /// How long a live quote is served from memory before the feed is asked again.
    #[serde(with = "crate::duration::human")]
    pub cache_ttl: Duration,

    /// Retries on rate limiting or server errors, with exponential backoff.
    pub max_retries: u32,

    #[serde(with = "crate::duration::human")]
    pub request_timeout: Duration,

    /// Override for the CoinGecko API root, mostly for tests and proxies.
    pub base_url: Option<String>,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30 * 60),
            max_retries: 3,
            request_timeout: Duration::from_secs(10),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Window in which same-asset, same-quantity entries are reported as possible duplicates.
    #[serde(with = "crate::duration::human")]
    pub duplicate_tolerance: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            duplicate_tolerance: Duration::from_secs(5 * 60),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to data directory. If relative, resolved from config file location.
    /// If not specified, defaults to the config file's directory.
    pub data_dir: Option<PathBuf>,

    /// Lowercase currency code used for display values (e.g. "jpy").
    pub display_currency: String,

    pub timezone: Tz,

    pub prices: PriceConfig,

    pub ledger: LedgerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            display_currency: default_display_currency(),
            timezone: default_timezone(),
            prices: PriceConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.display_currency = config.display_currency.trim().to_lowercase();

        Ok(config)
    }

    /// If `data_dir` is relative it is resolved against `config_dir`; if unset,
    /// `config_dir` itself is used.
    pub fn resolve_data_dir(&self, config_dir: &Path) -> PathBuf {
        match &self.data_dir {
            Some(data_dir) if data_dir.is_absolute() => data_dir.clone(),
            Some(data_dir) => config_dir.join(data_dir),
            None => config_dir.to_path_buf(),
        }
    }
}

/// Loaded configuration with resolved paths.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
    pub display_currency: String,
    pub timezone: Tz,
    pub prices: PriceConfig,
    pub ledger: LedgerConfig,
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./coinledger.toml` if it exists in current directory
/// 2. `~/.local/share/coinledger/coinledger.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from(CONFIG_FILE_NAME);
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("coinledger").join(CONFIG_FILE_NAME);
    }

    local_config
}

impl ResolvedConfig {
    fn from_config(config: Config, config_path: PathBuf, config_dir: &Path) -> Self {
        Self {
            data_dir: config.resolve_data_dir(config_dir),
            config_path,
            display_currency: config.display_currency,
            timezone: config.timezone,
            prices: config.prices,
            ledger: config.ledger,
        }
    }

    /// Load and resolve config from a file path.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;
        let config_dir = config_path
            .parent()
            .context("Config file has no parent directory")?
            .to_path_buf();

        let config = Config::load(&config_path)?;
        Ok(Self::from_config(config, config_path, &config_dir))
    }

    /// Like [`ResolvedConfig::load`], but a missing file yields the defaults with the
    /// file's intended directory as the data directory.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load(config_path);
        }

        let config_path = if config_path.is_relative() {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(config_path)
        } else {
            config_path.to_path_buf()
        };
        let config_dir = config_path
            .parent()
            .context("Config path has no parent directory")?
            .to_path_buf();

        Ok(Self::from_config(Config::default(), config_path, &config_dir))
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        to_chrono(self.prices.cache_ttl)
    }

    pub fn duplicate_tolerance(&self) -> chrono::Duration {
        to_chrono(self.ledger.duplicate_tolerance)
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}
