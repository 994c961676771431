use crate::provider::{Balance, TokenAccount, TransactionRecord};
use crate::storage::StorageError;

use serde::{Deserialize, Serialize};

/// Which transactions a query or a subscription wants to see
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionFilter {
	#[default]
	All,
	Pending,
	/// Positive amount (funds received)
	Incoming,
	/// Negative amount (funds sent)
	Outgoing,
}

impl TransactionFilter {
	pub fn matches(&self, record: &TransactionRecord) -> bool {
		match self {
			TransactionFilter::All => true,
			TransactionFilter::Pending => record.is_pending,
			TransactionFilter::Incoming => record.amount > 0,
			TransactionFilter::Outgoing => record.amount < 0,
		}
	}
}

/// Persistence of one wallet's balance, token accounts and transaction history.
///
/// Every write is atomic: after an error nothing of that call is visible.
#[async_trait::async_trait]
pub trait StoragePort: Send + Sync {
	async fn save_balance(&self, balance: &Balance) -> Result<(), StorageError>;

	async fn balance(&self) -> Result<Option<Balance>, StorageError>;

	async fn save_token_accounts(&self, accounts: &[TokenAccount]) -> Result<(), StorageError>;

	async fn token_accounts(&self) -> Result<Vec<TokenAccount>, StorageError>;

	/// Inserts or replaces records by paging token, all or nothing.
	async fn save_transactions(&self, records: &[TransactionRecord]) -> Result<(), StorageError>;

	/// Record with the highest paging token
	async fn latest(&self) -> Result<Option<TransactionRecord>, StorageError>;

	/// Record with the lowest paging token
	async fn oldest(&self) -> Result<Option<TransactionRecord>, StorageError>;

	/// Newest first. `cursor` is an exclusive upper bound on the paging token.
	async fn query(
		&self,
		filter: TransactionFilter,
		cursor: Option<u64>,
		limit: usize,
	) -> Result<Vec<TransactionRecord>, StorageError>;

	async fn pending(&self) -> Result<Vec<TransactionRecord>, StorageError>;

	async fn remove_transactions(&self, hashes: &[String]) -> Result<(), StorageError>;

	/// Records that the backward sweep reached the start of history.
	async fn mark_all_synced(&self) -> Result<(), StorageError>;

	async fn is_all_synced(&self) -> Result<bool, StorageError>;
}
