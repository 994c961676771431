//! File-backed wallet storage.
//!
//! Each wallet lives in `<data_dir>/wallet_<id>.json`. A write builds the next snapshot
//! in memory, writes it to a temporary file, renames it over the old one and only then
//! swaps the in-memory copy, so readers never observe a state that is not on disk.

use crate::provider::{Balance, TokenAccount, TransactionRecord};
use crate::storage::StorageError;
use crate::storage::memory::StoredState;
use crate::storage::repositories::{StoragePort, TransactionFilter};

use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// [`StoragePort`] persisted as one JSON document per wallet
pub struct FileStorage {
	path: PathBuf,
	state: Mutex<StoredState>,
}

impl FileStorage {
	/// Opens (or creates) the snapshot of `wallet_id` under `data_dir`.
	pub async fn open(data_dir: impl AsRef<Path>, wallet_id: &str) -> Result<Self, StorageError> {
		if wallet_id.is_empty()
			|| !wallet_id
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
		{
			return Err(StorageError::InvalidWalletId(wallet_id.to_string()));
		}

		let data_dir = data_dir.as_ref();
		tokio::fs::create_dir_all(data_dir).await?;
		let path = data_dir.join(format!("wallet_{}.json", wallet_id));

		let state = match tokio::fs::read(&path).await {
			Ok(bytes) => {
				let state: StoredState = serde_json::from_slice(&bytes)?;
				info!(
					"Loaded wallet '{}' from {:?} ({} transactions)",
					wallet_id,
					path,
					state.transactions.len()
				);
				state
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredState::default(),
			Err(e) => return Err(e.into()),
		};

		Ok(Self {
			path,
			state: Mutex::new(state),
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Applies `change` to a copy of the state, persists it, then commits it.
	async fn write<F>(&self, change: F) -> Result<(), StorageError>
	where
		F: FnOnce(&mut StoredState),
	{
		let mut guard = self.state.lock().await;
		let mut next = guard.clone();
		change(&mut next);

		let bytes = serde_json::to_vec_pretty(&next)?;
		let tmp = self.path.with_extension("json.tmp");
		tokio::fs::write(&tmp, &bytes).await?;
		tokio::fs::rename(&tmp, &self.path).await?;

		debug!("Persisted wallet snapshot to {:?}", self.path);
		*guard = next;
		Ok(())
	}
}

#[async_trait::async_trait]
impl StoragePort for FileStorage {
	async fn save_balance(&self, balance: &Balance) -> Result<(), StorageError> {
		let balance = balance.clone();
		self.write(move |state| state.balance = Some(balance)).await
	}

	async fn balance(&self) -> Result<Option<Balance>, StorageError> {
		Ok(self.state.lock().await.balance.clone())
	}

	async fn save_token_accounts(&self, accounts: &[TokenAccount]) -> Result<(), StorageError> {
		let accounts = accounts.to_vec();
		self.write(move |state| state.token_accounts = accounts).await
	}

	async fn token_accounts(&self) -> Result<Vec<TokenAccount>, StorageError> {
		Ok(self.state.lock().await.token_accounts.clone())
	}

	async fn save_transactions(&self, records: &[TransactionRecord]) -> Result<(), StorageError> {
		if records.is_empty() {
			return Ok(());
		}
		self.write(|state| state.upsert(records)).await
	}

	async fn latest(&self) -> Result<Option<TransactionRecord>, StorageError> {
		Ok(self.state.lock().await.latest())
	}

	async fn oldest(&self) -> Result<Option<TransactionRecord>, StorageError> {
		Ok(self.state.lock().await.oldest())
	}

	async fn query(
		&self,
		filter: TransactionFilter,
		cursor: Option<u64>,
		limit: usize,
	) -> Result<Vec<TransactionRecord>, StorageError> {
		Ok(self.state.lock().await.query(filter, cursor, limit))
	}

	async fn pending(&self) -> Result<Vec<TransactionRecord>, StorageError> {
		Ok(self.state.lock().await.pending())
	}

	async fn remove_transactions(&self, hashes: &[String]) -> Result<(), StorageError> {
		if hashes.is_empty() {
			return Ok(());
		}
		self.write(|state| state.remove(hashes)).await
	}

	async fn mark_all_synced(&self) -> Result<(), StorageError> {
		self.write(|state| state.all_synced = true).await
	}

	async fn is_all_synced(&self) -> Result<bool, StorageError> {
		Ok(self.state.lock().await.all_synced)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::storage::memory::tests::record;

	#[tokio::test]
	async fn test_batch_survives_reopen() {
		let dir = tempfile::tempdir().unwrap();

		{
			let storage = FileStorage::open(dir.path(), "main").await.unwrap();
			storage
				.save_transactions(&[record(1, 5, false), record(2, -3, true)])
				.await
				.unwrap();
			storage
				.save_balance(&Balance {
					amount: 2,
					height: Some(10),
				})
				.await
				.unwrap();
			storage.mark_all_synced().await.unwrap();
		}

		let reopened = FileStorage::open(dir.path(), "main").await.unwrap();
		assert_eq!(reopened.latest().await.unwrap().unwrap().paging_token, 2);
		assert_eq!(reopened.pending().await.unwrap().len(), 1);
		assert_eq!(reopened.balance().await.unwrap().unwrap().amount, 2);
		assert!(reopened.is_all_synced().await.unwrap());
		assert!(!reopened.path().with_extension("json.tmp").exists());
	}

	#[tokio::test]
	async fn test_wallets_are_isolated() {
		let dir = tempfile::tempdir().unwrap();
		let a = FileStorage::open(dir.path(), "a").await.unwrap();
		let b = FileStorage::open(dir.path(), "b").await.unwrap();
		a.save_transactions(&[record(1, 1, false)]).await.unwrap();
		assert!(b.latest().await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_rejects_path_like_wallet_ids() {
		let dir = tempfile::tempdir().unwrap();
		for id in ["", "../x", "a/b"] {
			assert!(matches!(
				FileStorage::open(dir.path(), id).await,
				Err(StorageError::InvalidWalletId(_))
			));
		}
	}

	#[tokio::test]
	async fn test_failed_write_is_not_committed() {
		let dir = tempfile::tempdir().unwrap();
		let storage = FileStorage::open(dir.path(), "main").await.unwrap();
		storage.save_transactions(&[record(1, 1, false)]).await.unwrap();

		// A directory in place of the temp file makes the next write fail
		std::fs::create_dir(storage.path().with_extension("json.tmp")).unwrap();
		assert!(storage.save_transactions(&[record(2, 1, false)]).await.is_err());
		assert_eq!(storage.latest().await.unwrap().unwrap().paging_token, 1);
	}
}
