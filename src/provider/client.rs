//! HTTP provider for Horizon-style account APIs and CoinGecko-style price APIs.
//!
//! Every request goes through [`HttpProvider::get_json`], which retries transient
//! failures (connect errors, timeouts, 429 and 5xx) with exponential backoff and gives
//! up on anything else right away.

use crate::config::ProviderConfig;
use crate::keys::{Address, Network};
use crate::provider::port::{PriceProvider, ProviderPort};
use crate::provider::types::*;
use crate::utils::parse_decimal_amount;

use backoff::{ExponentialBackoff, future::retry};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Stellar amounts carry 7 decimals
const STROOP_DECIMALS: u32 = 7;

/// REST provider backed by `reqwest`
#[derive(Clone)]
pub struct HttpProvider {
	http_client: Client,
	horizon_url: String,
	price_url: String,
	backoff: ExponentialBackoff,
}

impl HttpProvider {
	pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
		let http_client = Client::builder().timeout(config.timeout()).build()?;

		let backoff = ExponentialBackoff {
			max_elapsed_time: Some(config.max_retry()),
			..ExponentialBackoff::default()
		};

		Ok(Self {
			http_client,
			horizon_url: config.horizon_url.trim_end_matches('/').to_string(),
			price_url: config.price_url.trim_end_matches('/').to_string(),
			backoff,
		})
	}

	/// Horizon only serves Stellar accounts.
	pub fn supports(network: Network) -> bool {
		matches!(network, Network::Stellar)
	}

	/// Retry policy applied to every request
	pub fn retry_policy(&self) -> ExponentialBackoff {
		self.backoff.clone()
	}

	/// GET `url` and decode the body. `Ok(None)` on 404.
	async fn get_json<T: DeserializeOwned + Send>(
		&self,
		url: &str,
		query: &[(&str, String)],
	) -> Result<Option<T>, ProviderError> {
		retry(self.backoff.clone(), || async move {
			let response = self
				.http_client
				.get(url)
				.query(query)
				.send()
				.await
				.map_err(|e| classify(ProviderError::Http(e)))?;

			let status = response.status();
			if status == StatusCode::NOT_FOUND {
				return Ok(None);
			}
			if !status.is_success() {
				let body = response.text().await.unwrap_or_default();
				return Err(classify(ProviderError::Status {
					status: status.as_u16(),
					body,
				}));
			}

			let value = response
				.json::<T>()
				.await
				.map_err(|e| backoff::Error::permanent(ProviderError::Decode(e.to_string())))?;
			Ok(Some(value))
		})
		.await
	}
}

fn classify(error: ProviderError) -> backoff::Error<ProviderError> {
	if error.is_transient() {
		warn!("Transient provider error, retrying: {}", error);
		backoff::Error::transient(error)
	} else {
		backoff::Error::permanent(error)
	}
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
	balances: Vec<AccountBalance>,
	last_modified_ledger: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AccountBalance {
	balance: String,
	asset_type: String,
	asset_code: Option<String>,
	asset_issuer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
	#[serde(rename = "_embedded")]
	embedded: Embedded<T>,
}

#[derive(Debug, Deserialize)]
struct Embedded<T> {
	records: Vec<T>,
}

/// Payment-like operation record (`payment`, `create_account`, path payments)
#[derive(Debug, Deserialize)]
struct OperationRecord {
	paging_token: String,
	transaction_hash: String,
	created_at: DateTime<Utc>,
	#[serde(default)]
	transaction_successful: Option<bool>,
	from: Option<String>,
	to: Option<String>,
	amount: Option<String>,
	funder: Option<String>,
	account: Option<String>,
	starting_balance: Option<String>,
	asset_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionResponse {
	hash: String,
	paging_token: String,
	created_at: DateTime<Utc>,
	ledger: Option<u64>,
	fee_charged: Option<String>,
	source_account: Option<String>,
	#[serde(default = "default_true")]
	successful: bool,
}

fn default_true() -> bool {
	true
}

fn parse_token(token: &str) -> Result<u64, ProviderError> {
	token
		.parse()
		.map_err(|_| ProviderError::Decode(format!("bad paging token '{}'", token)))
}

fn parse_amount(amount: &str) -> Result<i128, ProviderError> {
	parse_decimal_amount(amount, STROOP_DECIMALS)
		.ok_or_else(|| ProviderError::Decode(format!("bad amount '{}'", amount)))
}

impl OperationRecord {
	fn into_record(self, owner: &Address) -> Result<TransactionRecord, ProviderError> {
		// create_account reports funder/account/starting_balance instead of from/to/amount
		let from = self.from.or(self.funder);
		let to = self.to.or(self.account);
		let magnitude = match self.amount.as_deref().or(self.starting_balance.as_deref()) {
			// Only native amounts are folded into the record amount
			Some(amount) if self.asset_type.as_deref().is_none_or(|t| t == "native") => {
				parse_amount(amount)?
			}
			_ => 0,
		};
		let amount = if from.as_deref() == Some(owner.as_str()) {
			-magnitude
		} else {
			magnitude
		};

		Ok(TransactionRecord {
			hash: self.transaction_hash,
			paging_token: parse_token(&self.paging_token)?,
			timestamp: self.created_at,
			amount,
			fee: 0,
			from,
			to,
			// Horizon only lists operations of ledgers that already closed
			is_pending: false,
			confirmations: if self.transaction_successful.unwrap_or(true) {
				1
			} else {
				0
			},
			block_height: None,
		})
	}
}

#[async_trait::async_trait]
impl ProviderPort for HttpProvider {
	async fn fetch_balance(&self, address: &Address) -> Result<Balance, ProviderError> {
		let url = format!("{}/accounts/{}", self.horizon_url, address);
		let Some(account) = self.get_json::<AccountResponse>(&url, &[]).await? else {
			// Unfunded accounts do not exist on chain yet
			debug!("Account {} not found, reporting zero balance", address);
			return Ok(Balance {
				amount: 0,
				height: None,
			});
		};

		let native = account
			.balances
			.iter()
			.find(|b| b.asset_type == "native")
			.map(|b| parse_amount(&b.balance))
			.transpose()?
			.unwrap_or(0);

		Ok(Balance {
			amount: native,
			height: account.last_modified_ledger,
		})
	}

	async fn fetch_token_accounts(
		&self,
		address: &Address,
	) -> Result<Vec<TokenAccount>, ProviderError> {
		let url = format!("{}/accounts/{}", self.horizon_url, address);
		let Some(account) = self.get_json::<AccountResponse>(&url, &[]).await? else {
			return Ok(Vec::new());
		};

		account
			.balances
			.into_iter()
			.filter(|b| b.asset_type != "native")
			.map(|b| {
				let code = b.asset_code.unwrap_or_default();
				let issuer = b.asset_issuer.unwrap_or_default();
				Ok(TokenAccount {
					mint: format!("{}:{}", code, issuer),
					amount: parse_amount(&b.balance)?,
					decimals: STROOP_DECIMALS as u8,
				})
			})
			.collect()
	}

	async fn fetch_operations(
		&self,
		address: &Address,
		cursor: Option<u64>,
		limit: usize,
		order: Order,
	) -> Result<Vec<TransactionRecord>, ProviderError> {
		let url = format!("{}/accounts/{}/payments", self.horizon_url, address);
		let mut query = vec![
			("limit", limit.to_string()),
			("order", order.as_str().to_string()),
		];
		if let Some(cursor) = cursor {
			query.push(("cursor", cursor.to_string()));
		}

		let Some(page) = self.get_json::<Page<OperationRecord>>(&url, &query).await? else {
			return Ok(Vec::new());
		};

		debug!(
			"Fetched {} operations for {} (cursor {:?}, {})",
			page.embedded.records.len(),
			address,
			cursor,
			order.as_str()
		);

		page.embedded
			.records
			.into_iter()
			.map(|record| record.into_record(address))
			.collect()
	}

	async fn fetch_transaction(
		&self,
		hash: &str,
	) -> Result<Option<TransactionRecord>, ProviderError> {
		let url = format!("{}/transactions/{}", self.horizon_url, hash);
		let Some(tx) = self.get_json::<TransactionResponse>(&url, &[]).await? else {
			return Ok(None);
		};

		let fee = match tx.fee_charged.as_deref() {
			Some(fee) => fee
				.parse()
				.map_err(|_| ProviderError::Decode(format!("bad fee '{}'", fee)))?,
			None => 0,
		};

		Ok(Some(TransactionRecord {
			hash: tx.hash,
			paging_token: parse_token(&tx.paging_token)?,
			timestamp: tx.created_at,
			amount: 0,
			fee,
			from: tx.source_account,
			to: None,
			is_pending: false,
			confirmations: if tx.successful { 1 } else { 0 },
			block_height: tx.ledger,
		}))
	}
}

#[async_trait::async_trait]
impl PriceProvider for HttpProvider {
	async fn fetch_prices(
		&self,
		coin_uids: &[String],
		currency_code: &str,
	) -> Result<PriceMap, ProviderError> {
		if coin_uids.is_empty() {
			return Ok(PriceMap::new());
		}

		let currency = currency_code.to_lowercase();
		let url = format!("{}/simple/price", self.price_url);
		let query = [
			("ids", coin_uids.join(",")),
			("vs_currencies", currency.clone()),
		];

		let body: HashMap<String, HashMap<String, f64>> = self
			.get_json(&url, &query)
			.await?
			.ok_or(ProviderError::NoData)?;

		Ok(body
			.into_iter()
			.filter_map(|(uid, quotes)| quotes.get(&currency).map(|price| (uid, *price)))
			.collect())
	}
}
