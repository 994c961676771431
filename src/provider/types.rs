//! Types exchanged with remote data providers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Coin uid → price in one fiat currency
pub type PriceMap = HashMap<String, f64>;

/// Native balance of an address in the network's base unit (satoshi, lamport, stroop).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
	pub amount: i128,
	/// Block or ledger height the balance was observed at, when the provider reports it
	pub height: Option<u64>,
}

/// Balance of a non-native asset held by the address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAccount {
	/// Mint address (Solana) or `CODE:ISSUER` (Stellar)
	pub mint: String,
	pub amount: i128,
	pub decimals: u8,
}

/// A transaction or operation touching the wallet's address.
///
/// Confirmed records are immutable; pending ones are updated in place by hash until
/// they confirm or are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
	pub hash: String,
	/// Monotonic position in the remote history, used as the paging cursor
	pub paging_token: u64,
	pub timestamp: DateTime<Utc>,
	pub amount: i128,
	pub fee: u64,
	pub from: Option<String>,
	pub to: Option<String>,
	pub is_pending: bool,
	pub confirmations: u32,
	pub block_height: Option<u64>,
}

/// Sort order of a history page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
	/// Oldest first; a cursor returns records after it
	Asc,
	/// Newest first; a cursor returns records before it
	Desc,
}

impl Order {
	pub fn as_str(&self) -> &'static str {
		match self {
			Order::Asc => "asc",
			Order::Desc => "desc",
		}
	}
}

/// Errors returned by provider implementations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("Unexpected status {status}: {body}")]
	Status { status: u16, body: String },

	#[error("Failed to decode response: {0}")]
	Decode(String),

	#[error("No data in response")]
	NoData,

	#[error("Network unreachable: {0}")]
	Unreachable(String),
}

impl ProviderError {
	/// Whether retrying the same request may succeed.
	pub fn is_transient(&self) -> bool {
		match self {
			ProviderError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
			ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
			ProviderError::Unreachable(_) => true,
			ProviderError::Decode(_) | ProviderError::NoData => false,
		}
	}

	/// Whether the error means there is no connectivity at all.
	pub fn is_connectivity(&self) -> bool {
		match self {
			ProviderError::Http(e) => e.is_connect(),
			ProviderError::Unreachable(_) => true,
			_ => false,
		}
	}
}
