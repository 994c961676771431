//! Runtime configuration.
//!
//! Settings are read from an optional TOML file, then `WALLET_SYNC_*` environment
//! variables override individual fields. Every field has a default so an empty file
//! (or no file) is a valid configuration.

use crate::keys::Network;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const ENV_PREFIX: &str = "WALLET_SYNC_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Failed to read config file {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse config: {0}")]
	Parse(#[from] toml::de::Error),

	#[error("Invalid value for {key}: {value}")]
	InvalidValue { key: String, value: String },
}

/// Top-level configuration of the demo binary and the kits it builds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
	pub network: Network,
	pub wallet_id: String,
	pub data_dir: PathBuf,
	pub log_level: String,
	pub sync: SyncConfig,
	pub provider: ProviderConfig,
	pub price: PriceConfig,
}

/// Knobs of the sync managers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
	/// Records requested per history page
	pub page_limit: usize,
	/// Seconds between periodic refreshes of a started kit
	pub poll_interval_secs: u64,
	/// Upper bound of one sync cycle, provider calls included
	pub request_timeout_secs: u64,
	/// Confirmations after which a pending transaction counts as confirmed
	pub confirmation_threshold: u32,
	/// Consecutive misses after which a pending transaction is dropped
	pub pending_drop_after: u32,
	/// Capacity of the transaction event channel
	pub event_buffer: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
	/// Horizon-style REST endpoint
	pub horizon_url: String,
	/// CoinGecko-style price endpoint
	pub price_url: String,
	pub timeout_secs: u64,
	/// Total time a failing request is retried before giving up
	pub max_retry_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceConfig {
	pub currencies: Vec<String>,
	pub coin_uids: Vec<String>,
	pub poll_interval_secs: u64,
}

impl Default for AppConfig {
	fn default() -> Self {
		Self {
			network: Network::Stellar,
			wallet_id: "default".to_string(),
			data_dir: PathBuf::from("./wallet-data"),
			log_level: "info".to_string(),
			sync: SyncConfig::default(),
			provider: ProviderConfig::default(),
			price: PriceConfig::default(),
		}
	}
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			page_limit: 100,
			poll_interval_secs: 30,
			request_timeout_secs: 30,
			confirmation_threshold: 1,
			pending_drop_after: 10,
			event_buffer: 64,
		}
	}
}

impl Default for ProviderConfig {
	fn default() -> Self {
		Self {
			horizon_url: "https://horizon.stellar.org".to_string(),
			price_url: "https://api.coingecko.com/api/v3".to_string(),
			timeout_secs: 15,
			max_retry_secs: 60,
		}
	}
}

impl Default for PriceConfig {
	fn default() -> Self {
		Self {
			currencies: vec!["usd".to_string()],
			coin_uids: vec!["stellar".to_string()],
			poll_interval_secs: 60,
		}
	}
}

/// Shortest interval or timeout a zero-second setting is raised to
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

impl SyncConfig {
	/// Never shorter than [`MIN_INTERVAL`]
	pub fn poll_interval(&self) -> Duration {
		Duration::from_secs(self.poll_interval_secs).max(MIN_INTERVAL)
	}

	/// Never shorter than [`MIN_INTERVAL`]
	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs).max(MIN_INTERVAL)
	}
}

impl ProviderConfig {
	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout_secs)
	}

	pub fn max_retry(&self) -> Duration {
		Duration::from_secs(self.max_retry_secs)
	}
}

impl PriceConfig {
	/// Never shorter than [`MIN_INTERVAL`]
	pub fn poll_interval(&self) -> Duration {
		Duration::from_secs(self.poll_interval_secs).max(MIN_INTERVAL)
	}
}

impl AppConfig {
	/// Loads the file at `path` (if any) and applies environment overrides.
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		let mut config = match path {
			Some(path) => {
				let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
					path: path.to_path_buf(),
					source,
				})?;
				Self::from_toml(&raw)?
			}
			None => Self::default(),
		};
		config.apply_overrides(|key| std::env::var(key).ok())?;
		Ok(config)
	}

	pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(raw)?;
		config.validate()?;
		Ok(config)
	}

	/// Rejects settings the sync engine cannot run with.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let positive = [
			("sync.page_limit", self.sync.page_limit as u64),
			("sync.poll_interval_secs", self.sync.poll_interval_secs),
			("sync.request_timeout_secs", self.sync.request_timeout_secs),
			("sync.event_buffer", self.sync.event_buffer as u64),
			("price.poll_interval_secs", self.price.poll_interval_secs),
		];
		match positive.into_iter().find(|(_, value)| *value == 0) {
			Some((key, value)) => Err(ConfigError::InvalidValue {
				key: key.to_string(),
				value: value.to_string(),
			}),
			None => Ok(()),
		}
	}

	/// Overrides fields from `WALLET_SYNC_<FIELD>` variables found by `lookup`.
	pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

		if let Some(value) = get("NETWORK") {
			self.network = Network::from_str(&value).map_err(|_| ConfigError::InvalidValue {
				key: "NETWORK".to_string(),
				value,
			})?;
		}
		if let Some(value) = get("WALLET_ID") {
			self.wallet_id = value;
		}
		if let Some(value) = get("DATA_DIR") {
			self.data_dir = PathBuf::from(value);
		}
		if let Some(value) = get("LOG_LEVEL") {
			self.log_level = value;
		}
		if let Some(value) = get("HORIZON_URL") {
			self.provider.horizon_url = value;
		}
		if let Some(value) = get("PRICE_URL") {
			self.provider.price_url = value;
		}
		if let Some(value) = get("PAGE_LIMIT") {
			self.sync.page_limit = parse_number("PAGE_LIMIT", value)?;
		}
		if let Some(value) = get("POLL_INTERVAL_SECS") {
			self.sync.poll_interval_secs = parse_number("POLL_INTERVAL_SECS", value)?;
		}
		if let Some(value) = get("REQUEST_TIMEOUT_SECS") {
			self.sync.request_timeout_secs = parse_number("REQUEST_TIMEOUT_SECS", value)?;
		}
		if let Some(value) = get("PRICE_CURRENCIES") {
			self.price.currencies = split_list(&value);
		}
		if let Some(value) = get("PRICE_COINS") {
			self.price.coin_uids = split_list(&value);
		}
		if let Some(value) = get("PRICE_POLL_INTERVAL_SECS") {
			self.price.poll_interval_secs = parse_number("PRICE_POLL_INTERVAL_SECS", value)?;
		}
		self.validate()
	}
}

fn parse_number<T: FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
	value.trim().parse().map_err(|_| ConfigError::InvalidValue {
		key: key.to_string(),
		value,
	})
}

fn split_list(value: &str) -> Vec<String> {
	value
		.split(',')
		.map(|item| item.trim().to_lowercase())
		.filter(|item| !item.is_empty())
		.unique()
		.collect()
}
