#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use wallet_sync::keys::{Address, Network, Seed};
use wallet_sync::price::{PriceListener, Scheduler, SchedulerFactory};
use wallet_sync::provider::{
	Balance, Order, ProviderError, ProviderPort, TokenAccount, TransactionRecord,
};

pub const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

pub fn seed() -> Seed {
	Seed::from_mnemonic(MNEMONIC, "").unwrap()
}

pub fn address() -> Address {
	wallet_sync::keys::derive(&seed(), Network::Stellar, None)
		.unwrap()
		.address()
		.unwrap()
}

pub fn record(token: u64, amount: i128) -> TransactionRecord {
	TransactionRecord {
		hash: format!("tx{token:05}"),
		paging_token: token,
		timestamp: Utc.timestamp_opt(1_700_000_000 + token as i64, 0).unwrap(),
		amount,
		fee: 100,
		from: None,
		to: None,
		is_pending: false,
		confirmations: 1,
		block_height: Some(token),
	}
}

pub fn pending(token: u64, amount: i128) -> TransactionRecord {
	TransactionRecord {
		is_pending: true,
		confirmations: 0,
		block_height: None,
		..record(token, amount)
	}
}

/// Scripted provider holding a remote history sorted by paging token
#[derive(Default)]
pub struct MockProvider {
	pub history: Mutex<Vec<TransactionRecord>>,
	pub balance: Mutex<i128>,
	pub token_accounts: Mutex<Vec<TokenAccount>>,
	/// Status answers of `fetch_transaction`; missing hashes are unknown
	pub remote: Mutex<HashMap<String, TransactionRecord>>,
	pub offline: AtomicBool,
	pub delay: Mutex<Duration>,
	pub operation_calls: AtomicUsize,
	pub balance_calls: AtomicUsize,
	pub transaction_calls: AtomicUsize,
}

impl MockProvider {
	pub fn with_history(count: u64) -> Arc<Self> {
		let provider = Self::default();
		*provider.history.lock().unwrap() = (1..=count).map(|t| record(t, 10)).collect();
		Arc::new(provider)
	}

	pub fn push(&self, record: TransactionRecord) {
		let mut history = self.history.lock().unwrap();
		history.push(record);
		history.sort_by_key(|r| r.paging_token);
	}

	pub fn operation_calls(&self) -> usize {
		self.operation_calls.load(Ordering::SeqCst)
	}

	async fn simulate(&self) -> Result<(), ProviderError> {
		let delay = *self.delay.lock().unwrap();
		if !delay.is_zero() {
			tokio::time::sleep(delay).await;
		}
		if self.offline.load(Ordering::SeqCst) {
			return Err(ProviderError::Unreachable("mock offline".to_string()));
		}
		Ok(())
	}
}

#[async_trait]
impl ProviderPort for MockProvider {
	async fn fetch_balance(&self, _address: &Address) -> Result<Balance, ProviderError> {
		self.balance_calls.fetch_add(1, Ordering::SeqCst);
		self.simulate().await?;
		Ok(Balance {
			amount: *self.balance.lock().unwrap(),
			height: None,
		})
	}

	async fn fetch_token_accounts(
		&self,
		_address: &Address,
	) -> Result<Vec<TokenAccount>, ProviderError> {
		self.simulate().await?;
		Ok(self.token_accounts.lock().unwrap().clone())
	}

	async fn fetch_operations(
		&self,
		_address: &Address,
		cursor: Option<u64>,
		limit: usize,
		order: Order,
	) -> Result<Vec<TransactionRecord>, ProviderError> {
		self.operation_calls.fetch_add(1, Ordering::SeqCst);
		self.simulate().await?;
		let history = self.history.lock().unwrap();
		let page = match order {
			Order::Asc => history
				.iter()
				.filter(|r| cursor.is_none_or(|c| r.paging_token > c))
				.take(limit)
				.cloned()
				.collect(),
			Order::Desc => history
				.iter()
				.rev()
				.filter(|r| cursor.is_none_or(|c| r.paging_token < c))
				.take(limit)
				.cloned()
				.collect(),
		};
		Ok(page)
	}

	async fn fetch_transaction(
		&self,
		hash: &str,
	) -> Result<Option<TransactionRecord>, ProviderError> {
		self.transaction_calls.fetch_add(1, Ordering::SeqCst);
		self.simulate().await?;
		Ok(self.remote.lock().unwrap().get(hash).cloned())
	}
}

/// Scheduler that only records what the manager asked of it
pub struct RecordingScheduler {
	pub currency_code: String,
	pub starts: Mutex<Vec<bool>>,
	pub stopped: AtomicBool,
}

impl Scheduler for RecordingScheduler {
	fn start(&self, force: bool) {
		self.starts.lock().unwrap().push(force);
	}

	fn stop(&self) {
		self.stopped.store(true, Ordering::SeqCst);
	}
}

#[derive(Default)]
pub struct RecordingFactory {
	pub schedulers: Mutex<Vec<Arc<RecordingScheduler>>>,
	pub listener: Mutex<Option<Weak<dyn PriceListener>>>,
}

impl RecordingFactory {
	pub fn scheduler_for(&self, currency_code: &str) -> Arc<RecordingScheduler> {
		self.schedulers
			.lock()
			.unwrap()
			.iter()
			.rev()
			.find(|s| s.currency_code == currency_code)
			.cloned()
			.unwrap()
	}

	/// Pushes a price tick through the manager as a scheduler would.
	pub fn tick(&self, currency_code: &str, prices: &[(&str, f64)]) {
		let listener = self.listener.lock().unwrap().clone().unwrap();
		listener.upgrade().unwrap().on_price_update(
			prices.iter().map(|(uid, p)| (uid.to_string(), *p)).collect(),
			currency_code,
		);
	}

	pub fn polled_coins(&self, currency_code: &str) -> BTreeSet<String> {
		let listener = self.listener.lock().unwrap().clone().unwrap();
		listener.upgrade().unwrap().coin_uids(currency_code)
	}
}

impl SchedulerFactory for RecordingFactory {
	fn scheduler(&self, currency_code: &str, listener: Weak<dyn PriceListener>) -> Arc<dyn Scheduler> {
		*self.listener.lock().unwrap() = Some(listener);
		let scheduler = Arc::new(RecordingScheduler {
			currency_code: currency_code.to_string(),
			starts: Mutex::new(Vec::new()),
			stopped: AtomicBool::new(false),
		});
		self.schedulers.lock().unwrap().push(scheduler.clone());
		scheduler
	}
}

/// Waits until `flow` yields a state matching `done`.
pub async fn wait_for_state<F>(
	mut flow: futures_util::stream::BoxStream<'static, wallet_sync::sync::SyncState>,
	done: F,
) -> wallet_sync::sync::SyncState
where
	F: Fn(&wallet_sync::sync::SyncState) -> bool,
{
	use futures_util::StreamExt;

	tokio::time::timeout(Duration::from_secs(30), async {
		loop {
			let state = flow.next().await.unwrap();
			if done(&state) {
				return state;
			}
		}
	})
	.await
	.unwrap()
}
