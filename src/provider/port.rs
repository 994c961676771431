use crate::keys::Address;
use crate::provider::types::{
	Balance, Order, PriceMap, ProviderError, TokenAccount, TransactionRecord,
};

/// Remote chain data the sync managers poll.
///
/// Implementations wrap an RPC node or a Horizon-like REST API. History paging is
/// cursor based: with [`Order::Asc`] a cursor returns records after it, with
/// [`Order::Desc`] records before it, and `None` starts from the oldest or newest end.
#[async_trait::async_trait]
pub trait ProviderPort: Send + Sync {
	async fn fetch_balance(&self, address: &Address) -> Result<Balance, ProviderError>;

	async fn fetch_token_accounts(
		&self,
		address: &Address,
	) -> Result<Vec<TokenAccount>, ProviderError>;

	async fn fetch_operations(
		&self,
		address: &Address,
		cursor: Option<u64>,
		limit: usize,
		order: Order,
	) -> Result<Vec<TransactionRecord>, ProviderError>;

	/// Looks a single transaction up by hash; `None` when the node does not know it.
	async fn fetch_transaction(
		&self,
		hash: &str,
	) -> Result<Option<TransactionRecord>, ProviderError>;
}

/// Source of coin prices for the price schedulers
#[async_trait::async_trait]
pub trait PriceProvider: Send + Sync {
	async fn fetch_prices(
		&self,
		coin_uids: &[String],
		currency_code: &str,
	) -> Result<PriceMap, ProviderError>;
}
