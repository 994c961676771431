//! Per-wallet composition root.
//!
//! A [`Kit`] is built from a seed, a network and a wallet id. It derives the wallet's
//! address, wires one sync state machine per sync unit (balance, token accounts,
//! transactions) to the shared storage and provider, and runs a periodic task that
//! refreshes all of them. The host only sees addresses, flows and queries; key
//! material never leaves the kit.

use crate::config::SyncConfig;
use crate::keys::{Address, DerivationPath, KeyError, Network, Seed, derive_address_key};
use crate::provider::{Balance, ProviderPort, TokenAccount, TransactionRecord};
use crate::storage::{StoragePort, TransactionFilter};
use crate::sync::{
	BalanceManager, SyncError, SyncState, SyncStateMachine, TokenAccountsManager,
	TransactionBatch, TransactionManager,
};

use futures_util::stream::BoxStream;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Identity of the wallet a kit syncs
pub struct KitParams {
	pub seed: Seed,
	pub network: Network,
	pub wallet_id: String,
	/// Replaces the network's default account path
	pub account_path: Option<DerivationPath>,
}

#[derive(Debug, thiserror::Error)]
pub enum KitError {
	#[error("Key error: {0}")]
	Key(#[from] KeyError),

	#[error("Sync error: {0}")]
	Sync(#[from] SyncError),
}

pub struct Kit {
	wallet_id: String,
	network: Network,
	seed: Seed,
	account_path: Option<DerivationPath>,
	address: Address,
	config: SyncConfig,

	balance: Arc<BalanceManager>,
	token_accounts: Arc<TokenAccountsManager>,
	transactions: Arc<TransactionManager>,

	balance_sync: SyncStateMachine,
	token_accounts_sync: SyncStateMachine,
	transactions_sync: SyncStateMachine,

	lifecycle: Mutex<Lifecycle>,
}

enum Lifecycle {
	Idle,
	/// Holds the periodic refresh task
	Running(JoinHandle<()>),
	Stopped,
}

impl Kit {
	/// Derives the wallet address and restores cached state from `storage`.
	///
	/// Nothing is fetched until [`start`](Self::start).
	pub async fn new(
		params: KitParams,
		storage: Arc<dyn StoragePort>,
		provider: Arc<dyn ProviderPort>,
		config: SyncConfig,
	) -> Result<Self, KitError> {
		let KitParams {
			seed,
			network,
			wallet_id,
			account_path,
		} = params;

		let address =
			derive_address_key(&seed, network, account_path.as_ref(), 0, 0)?.address()?;
		info!("Wallet '{}' on {} uses address {}", wallet_id, network, address);

		let balance = Arc::new(
			BalanceManager::new(address.clone(), provider.clone(), storage.clone()).await?,
		);
		let token_accounts = Arc::new(
			TokenAccountsManager::new(address.clone(), provider.clone(), storage.clone()).await?,
		);
		let transactions = Arc::new(TransactionManager::new(
			address.clone(),
			provider,
			storage,
			&config,
		));

		let timeout = config.request_timeout();
		Ok(Self {
			wallet_id,
			network,
			seed,
			account_path,
			address,
			balance_sync: SyncStateMachine::new(balance.clone(), timeout),
			token_accounts_sync: SyncStateMachine::new(token_accounts.clone(), timeout),
			transactions_sync: SyncStateMachine::new(transactions.clone(), timeout),
			balance,
			token_accounts,
			transactions,
			config,
			lifecycle: Mutex::new(Lifecycle::Idle),
		})
	}

	fn machines(&self) -> [&SyncStateMachine; 3] {
		[
			&self.balance_sync,
			&self.token_accounts_sync,
			&self.transactions_sync,
		]
	}

	/// Starts every sync unit and the periodic refresh. A stopped kit stays stopped.
	pub fn start(&self) {
		let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
		if !matches!(*lifecycle, Lifecycle::Idle) {
			return;
		}

		info!("Starting kit '{}'", self.wallet_id);
		for machine in self.machines() {
			machine.start();
		}

		let machines: Vec<SyncStateMachine> = self.machines().into_iter().cloned().collect();
		let period = self.config.poll_interval();
		*lifecycle = Lifecycle::Running(tokio::spawn(async move {
			let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
			loop {
				ticker.tick().await;
				debug!("Periodic refresh");
				for machine in &machines {
					machine.refresh(false);
				}
			}
		}));
	}

	/// Cancels in-flight cycles and the periodic refresh; every state freezes.
	pub fn stop(&self) {
		let previous = std::mem::replace(
			&mut *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner),
			Lifecycle::Stopped,
		);
		if let Lifecycle::Running(poller) = previous {
			poller.abort();
		}
		for machine in self.machines() {
			machine.stop();
		}
	}

	/// Forces a cycle of every unit.
	pub fn refresh(&self) -> Result<(), SyncError> {
		if !self.is_started() {
			return Err(SyncError::NotStarted);
		}
		for machine in self.machines() {
			machine.refresh(true);
		}
		Ok(())
	}

	pub fn is_started(&self) -> bool {
		self.transactions_sync.is_started()
	}

	pub fn wallet_id(&self) -> &str {
		&self.wallet_id
	}

	pub fn network(&self) -> Network {
		self.network
	}

	pub fn address(&self) -> &Address {
		&self.address
	}

	/// External address `index` of the account. Ed25519 networks only have index 0.
	pub fn receive_address(&self, index: u32) -> Result<Address, KeyError> {
		derive_address_key(&self.seed, self.network, self.account_path.as_ref(), 0, index)?
			.address()
	}

	pub fn balance(&self) -> Option<Balance> {
		self.balance.balance()
	}

	pub fn balance_flow(&self) -> BoxStream<'static, Option<Balance>> {
		self.balance.balance_flow()
	}

	pub fn token_accounts(&self) -> Vec<TokenAccount> {
		self.token_accounts.token_accounts()
	}

	pub fn token_accounts_flow(&self) -> BoxStream<'static, Vec<TokenAccount>> {
		self.token_accounts.token_accounts_flow()
	}

	pub fn balance_sync_state(&self) -> SyncState {
		self.balance_sync.state()
	}

	pub fn balance_sync_state_flow(&self) -> BoxStream<'static, SyncState> {
		self.balance_sync.state_flow()
	}

	pub fn token_accounts_sync_state(&self) -> SyncState {
		self.token_accounts_sync.state()
	}

	pub fn token_accounts_sync_state_flow(&self) -> BoxStream<'static, SyncState> {
		self.token_accounts_sync.state_flow()
	}

	pub fn transactions_sync_state(&self) -> SyncState {
		self.transactions_sync.state()
	}

	pub fn transactions_sync_state_flow(&self) -> BoxStream<'static, SyncState> {
		self.transactions_sync.state_flow()
	}

	pub fn transactions_flow(&self, filter: TransactionFilter) -> BoxStream<'static, TransactionBatch> {
		self.transactions.transactions_flow(filter)
	}

	/// Stored transactions, newest first, strictly older than `cursor`.
	pub async fn transactions(
		&self,
		filter: TransactionFilter,
		cursor: Option<u64>,
		limit: usize,
	) -> Result<Vec<TransactionRecord>, SyncError> {
		self.transactions.transactions(filter, cursor, limit).await
	}
}

impl Drop for Kit {
	fn drop(&mut self) {
		self.stop();
	}
}
