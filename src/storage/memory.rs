use crate::provider::{Balance, TokenAccount, TransactionRecord};
use crate::storage::StorageError;
use crate::storage::repositories::{StoragePort, TransactionFilter};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound;
use tokio::sync::RwLock;

/// Everything persisted for one wallet.
///
/// Both storage implementations apply writes to a copy of this value and only swap it
/// in once the write succeeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoredState {
	pub balance: Option<Balance>,
	#[serde(default)]
	pub token_accounts: Vec<TokenAccount>,
	/// Keyed by paging token; one transaction may span several operations sharing a hash
	#[serde(default)]
	pub transactions: BTreeMap<u64, TransactionRecord>,
	#[serde(default)]
	pub all_synced: bool,
}

impl StoredState {
	pub fn upsert(&mut self, records: &[TransactionRecord]) {
		for record in records {
			self.transactions.insert(record.paging_token, record.clone());
		}
	}

	/// Removes every operation of the given transactions.
	pub fn remove(&mut self, hashes: &[String]) {
		self.transactions
			.retain(|_, record| !hashes.contains(&record.hash));
	}

	pub fn latest(&self) -> Option<TransactionRecord> {
		self.transactions.last_key_value().map(|(_, r)| r.clone())
	}

	pub fn oldest(&self) -> Option<TransactionRecord> {
		self.transactions.first_key_value().map(|(_, r)| r.clone())
	}

	pub fn query(
		&self,
		filter: TransactionFilter,
		cursor: Option<u64>,
		limit: usize,
	) -> Vec<TransactionRecord> {
		let upper = cursor.map_or(Bound::Unbounded, Bound::Excluded);
		self.transactions
			.range((Bound::Unbounded, upper))
			.rev()
			.map(|(_, r)| r)
			.filter(|r| filter.matches(r))
			.take(limit)
			.cloned()
			.collect()
	}

	pub fn pending(&self) -> Vec<TransactionRecord> {
		self.transactions
			.values()
			.filter(|r| r.is_pending)
			.cloned()
			.collect()
	}
}

/// Volatile [`StoragePort`] implementation
#[derive(Debug, Default)]
pub struct InMemoryStorage {
	state: RwLock<StoredState>,
}

impl InMemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait::async_trait]
impl StoragePort for InMemoryStorage {
	async fn save_balance(&self, balance: &Balance) -> Result<(), StorageError> {
		self.state.write().await.balance = Some(balance.clone());
		Ok(())
	}

	async fn balance(&self) -> Result<Option<Balance>, StorageError> {
		Ok(self.state.read().await.balance.clone())
	}

	async fn save_token_accounts(&self, accounts: &[TokenAccount]) -> Result<(), StorageError> {
		self.state.write().await.token_accounts = accounts.to_vec();
		Ok(())
	}

	async fn token_accounts(&self) -> Result<Vec<TokenAccount>, StorageError> {
		Ok(self.state.read().await.token_accounts.clone())
	}

	async fn save_transactions(&self, records: &[TransactionRecord]) -> Result<(), StorageError> {
		self.state.write().await.upsert(records);
		Ok(())
	}

	async fn latest(&self) -> Result<Option<TransactionRecord>, StorageError> {
		Ok(self.state.read().await.latest())
	}

	async fn oldest(&self) -> Result<Option<TransactionRecord>, StorageError> {
		Ok(self.state.read().await.oldest())
	}

	async fn query(
		&self,
		filter: TransactionFilter,
		cursor: Option<u64>,
		limit: usize,
	) -> Result<Vec<TransactionRecord>, StorageError> {
		Ok(self.state.read().await.query(filter, cursor, limit))
	}

	async fn pending(&self) -> Result<Vec<TransactionRecord>, StorageError> {
		Ok(self.state.read().await.pending())
	}

	async fn remove_transactions(&self, hashes: &[String]) -> Result<(), StorageError> {
		self.state.write().await.remove(hashes);
		Ok(())
	}

	async fn mark_all_synced(&self) -> Result<(), StorageError> {
		self.state.write().await.all_synced = true;
		Ok(())
	}

	async fn is_all_synced(&self) -> Result<bool, StorageError> {
		Ok(self.state.read().await.all_synced)
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use chrono::{TimeZone, Utc};

	pub(crate) fn record(token: u64, amount: i128, pending: bool) -> TransactionRecord {
		TransactionRecord {
			hash: format!("tx{}", token),
			paging_token: token,
			timestamp: Utc.timestamp_opt(1_700_000_000 + token as i64, 0).unwrap(),
			amount,
			fee: 100,
			from: None,
			to: None,
			is_pending: pending,
			confirmations: if pending { 0 } else { 1 },
			block_height: None,
		}
	}

	#[tokio::test]
	async fn test_upsert_replaces_by_paging_token() {
		let storage = InMemoryStorage::new();
		storage
			.save_transactions(&[record(1, 10, true), record(2, -5, false)])
			.await
			.unwrap();

		let mut confirmed = record(1, 10, false);
		confirmed.confirmations = 3;
		storage.save_transactions(&[confirmed.clone()]).await.unwrap();

		let all = storage.query(TransactionFilter::All, None, 10).await.unwrap();
		assert_eq!(all.len(), 2);
		assert_eq!(storage.pending().await.unwrap().len(), 0);
		assert_eq!(storage.oldest().await.unwrap(), Some(confirmed));
	}

	#[tokio::test]
	async fn test_query_orders_and_pages() {
		let storage = InMemoryStorage::new();
		let records: Vec<_> = (1..=5)
			.map(|i| record(i, if i % 2 == 0 { -1 } else { 1 }, false))
			.collect();
		storage.save_transactions(&records).await.unwrap();

		let first = storage.query(TransactionFilter::All, None, 2).await.unwrap();
		assert_eq!(
			first.iter().map(|r| r.paging_token).collect::<Vec<_>>(),
			vec![5, 4]
		);

		let next = storage
			.query(TransactionFilter::All, Some(4), 2)
			.await
			.unwrap();
		assert_eq!(
			next.iter().map(|r| r.paging_token).collect::<Vec<_>>(),
			vec![3, 2]
		);

		let outgoing = storage
			.query(TransactionFilter::Outgoing, None, 10)
			.await
			.unwrap();
		assert_eq!(outgoing.len(), 2);
		assert_eq!(storage.latest().await.unwrap().unwrap().paging_token, 5);
	}

	#[tokio::test]
	async fn test_remove_and_synced_flag() {
		let storage = InMemoryStorage::new();
		storage.save_transactions(&[record(1, 1, true)]).await.unwrap();
		storage.remove_transactions(&["tx1".to_string()]).await.unwrap();
		assert!(storage.latest().await.unwrap().is_none());

		assert!(!storage.is_all_synced().await.unwrap());
		storage.mark_all_synced().await.unwrap();
		assert!(storage.is_all_synced().await.unwrap());
	}

	#[tokio::test]
	async fn test_operations_of_one_transaction_are_kept_apart() {
		let storage = InMemoryStorage::new();
		let mut first = record(7, -10, true);
		let mut second = record(8, -15, true);
		first.hash = "batch".to_string();
		second.hash = "batch".to_string();
		storage.save_transactions(&[first, second]).await.unwrap();

		let all = storage.query(TransactionFilter::All, None, 10).await.unwrap();
		assert_eq!(all.iter().map(|r| r.amount).collect::<Vec<_>>(), vec![-15, -10]);
		assert_eq!(storage.pending().await.unwrap().len(), 2);

		storage.remove_transactions(&["batch".to_string()]).await.unwrap();
		assert!(storage.latest().await.unwrap().is_none());
	}
}
