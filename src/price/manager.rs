//! Multiplexed coin price subscriptions.
//!
//! Any number of observers subscribe with a [`CoinPriceKey`] (tag, coin set, currency).
//! Observers with equal keys share one subject; all subjects of a currency share one
//! [`Scheduler`]. The scheduler is created with the first subject of its currency and
//! stopped with the last one. Every tick is split per subject into the intersection of
//! the tick's prices with the subject's coin set, and empty intersections are not sent.
//!
//! All bookkeeping sits behind one mutex so that a tick is fanned out from a single
//! consistent snapshot of the subjects. Scheduler calls happen outside the lock.

use crate::provider::PriceMap;

use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Tag of the subscriptions that back the wallet's own balances
pub const WALLET_TAG: &str = "wallet";

/// Identity of a price subject
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoinPriceKey {
	pub tag: String,
	pub coin_uids: BTreeSet<String>,
	pub currency_code: String,
}

impl CoinPriceKey {
	pub fn new<I, S>(tag: impl Into<String>, coin_uids: I, currency_code: impl Into<String>) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			tag: tag.into(),
			coin_uids: coin_uids.into_iter().map(Into::into).collect(),
			currency_code: currency_code.into(),
		}
	}
}

/// Receiver of scheduler ticks
pub trait PriceListener: Send + Sync {
	fn on_price_update(&self, prices: PriceMap, currency_code: &str);

	/// Coins the scheduler of `currency_code` should fetch
	fn coin_uids(&self, currency_code: &str) -> BTreeSet<String>;
}

/// Periodic price fetcher for one currency
pub trait Scheduler: Send + Sync {
	/// Starts polling if not running. `force` asks for an immediate tick.
	fn start(&self, force: bool);

	fn stop(&self);
}

pub trait SchedulerFactory: Send + Sync {
	fn scheduler(&self, currency_code: &str, listener: Weak<dyn PriceListener>)
	-> Arc<dyn Scheduler>;
}

struct Subject {
	sender: broadcast::Sender<PriceMap>,
	/// Live `PriceSubscription` handles
	ref_count: usize,
}

#[derive(Default)]
struct State {
	subjects: HashMap<CoinPriceKey, Subject>,
	schedulers: HashMap<String, Arc<dyn Scheduler>>,
	/// Merged prices of every tick per currency
	latest: HashMap<String, PriceMap>,
}

impl State {
	fn coin_uids(&self, currency_code: &str) -> BTreeSet<String> {
		self.subjects
			.keys()
			.filter(|key| key.currency_code == currency_code)
			.flat_map(|key| key.coin_uids.iter().cloned())
			.collect()
	}
}

fn intersect(prices: &PriceMap, coin_uids: &BTreeSet<String>) -> PriceMap {
	prices
		.iter()
		.filter(|(uid, _)| coin_uids.contains(*uid))
		.map(|(uid, price)| (uid.clone(), *price))
		.collect()
}

pub struct CoinPriceSyncManager {
	factory: Arc<dyn SchedulerFactory>,
	buffer: usize,
	state: Mutex<State>,
	me: Weak<CoinPriceSyncManager>,
}

impl CoinPriceSyncManager {
	/// `buffer` bounds how many ticks a slow subscription may fall behind.
	pub fn new(factory: Arc<dyn SchedulerFactory>, buffer: usize) -> Arc<Self> {
		Arc::new_cyclic(|me| Self {
			factory,
			buffer: buffer.max(1),
			state: Mutex::new(State::default()),
			me: me.clone(),
		})
	}

	fn lock(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Subscribes to the prices of `key.coin_uids` in `key.currency_code`.
	///
	/// Coins nobody observed in that currency yet trigger an immediate forced tick.
	/// The subscription starts with the last known prices of its coins, if any.
	pub fn subscribe(&self, key: CoinPriceKey) -> PriceSubscription {
		let (receiver, primed, start) = {
			let mut state = self.lock();

			let start = if let Some(subject) = state.subjects.get_mut(&key) {
				subject.ref_count += 1;
				None
			} else {
				let observed = state.coin_uids(&key.currency_code);
				let need_force = !key.coin_uids.is_subset(&observed);

				let (sender, _) = broadcast::channel(self.buffer);
				state.subjects.insert(
					key.clone(),
					Subject {
						sender,
						ref_count: 1,
					},
				);

				let existing = state.schedulers.get(&key.currency_code).cloned();
				match existing {
					Some(scheduler) => need_force.then_some((scheduler, true)),
					None => {
						let listener: Weak<dyn PriceListener> = self.me.clone();
						let scheduler = self.factory.scheduler(&key.currency_code, listener);
						state
							.schedulers
							.insert(key.currency_code.clone(), scheduler.clone());
						info!("Created price scheduler for {}", key.currency_code);
						Some((scheduler, need_force))
					}
				}
			};

			let subject = &state.subjects[&key];
			let receiver = subject.sender.subscribe();
			let primed = state
				.latest
				.get(&key.currency_code)
				.map(|prices| intersect(prices, &key.coin_uids))
				.filter(|prices| !prices.is_empty());

			(receiver, primed, start)
		};

		if let Some((scheduler, force)) = start {
			debug!("Starting price scheduler for {} (force: {})", key.currency_code, force);
			scheduler.start(force);
		}

		PriceSubscription {
			key,
			receiver,
			primed,
			manager: self.me.clone(),
		}
	}

	fn unsubscribe(&self, key: &CoinPriceKey) {
		let stopped = {
			let mut state = self.lock();
			let Some(subject) = state.subjects.get_mut(key) else {
				return;
			};
			subject.ref_count -= 1;
			if subject.ref_count > 0 {
				return;
			}

			state.subjects.remove(key);
			let currency_in_use = state
				.subjects
				.keys()
				.any(|other| other.currency_code == key.currency_code);
			if currency_in_use {
				None
			} else {
				state.latest.remove(&key.currency_code);
				state.schedulers.remove(&key.currency_code)
			}
		};

		if let Some(scheduler) = stopped {
			info!("Stopping price scheduler for {}", key.currency_code);
			scheduler.stop();
		}
	}

	/// Union of the coins observed in `currency_code`
	pub fn all_coin_uids(&self, currency_code: &str) -> BTreeSet<String> {
		self.lock().coin_uids(currency_code)
	}

	/// All observed coins, and the subset observed by wallet-tagged subscriptions.
	pub fn combined_coin_uids(&self, currency_code: &str) -> (BTreeSet<String>, BTreeSet<String>) {
		let state = self.lock();
		let wallet = state
			.subjects
			.keys()
			.filter(|key| key.currency_code == currency_code && key.tag == WALLET_TAG)
			.flat_map(|key| key.coin_uids.iter().cloned())
			.collect();
		(state.coin_uids(currency_code), wallet)
	}

	/// Last known prices in `currency_code`
	pub fn latest_prices(&self, currency_code: &str) -> PriceMap {
		self.lock()
			.latest
			.get(currency_code)
			.cloned()
			.unwrap_or_default()
	}

	pub fn scheduler_count(&self) -> usize {
		self.lock().schedulers.len()
	}

	pub fn subscription_count(&self, key: &CoinPriceKey) -> usize {
		self.lock()
			.subjects
			.get(key)
			.map(|subject| subject.ref_count)
			.unwrap_or(0)
	}
}

impl PriceListener for CoinPriceSyncManager {
	fn on_price_update(&self, prices: PriceMap, currency_code: &str) {
		let mut state = self.lock();
		if !state.schedulers.contains_key(currency_code) {
			// late tick of a scheduler that was already stopped
			return;
		}

		let mut delivered = 0;
		for (key, subject) in &state.subjects {
			if key.currency_code != currency_code {
				continue;
			}
			let slice = intersect(&prices, &key.coin_uids);
			if !slice.is_empty() {
				let _ = subject.sender.send(slice);
				delivered += 1;
			}
		}
		debug!(
			"Price tick for {}: {} coins, {} subjects",
			currency_code,
			prices.len(),
			delivered
		);

		state
			.latest
			.entry(currency_code.to_string())
			.or_default()
			.extend(prices);
	}

	fn coin_uids(&self, currency_code: &str) -> BTreeSet<String> {
		self.all_coin_uids(currency_code)
	}
}

/// Live price subscription. Dropping it unsubscribes.
pub struct PriceSubscription {
	key: CoinPriceKey,
	receiver: broadcast::Receiver<PriceMap>,
	primed: Option<PriceMap>,
	manager: Weak<CoinPriceSyncManager>,
}

impl PriceSubscription {
	pub fn key(&self) -> &CoinPriceKey {
		&self.key
	}

	/// Next non-empty price map. `None` once the manager is gone.
	pub async fn next(&mut self) -> Option<PriceMap> {
		if let Some(primed) = self.primed.take() {
			return Some(primed);
		}
		loop {
			match self.receiver.recv().await {
				Ok(prices) => return Some(prices),
				Err(broadcast::error::RecvError::Lagged(_)) => continue,
				Err(broadcast::error::RecvError::Closed) => return None,
			}
		}
	}

	/// Like [`next`](Self::next) without waiting.
	pub fn try_next(&mut self) -> Option<PriceMap> {
		if let Some(primed) = self.primed.take() {
			return Some(primed);
		}
		loop {
			match self.receiver.try_recv() {
				Ok(prices) => return Some(prices),
				Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
				Err(_) => return None,
			}
		}
	}

	pub fn into_stream(self) -> BoxStream<'static, PriceMap> {
		stream::unfold(self, |mut subscription| async move {
			let prices = subscription.next().await?;
			Some((prices, subscription))
		})
		.boxed()
	}
}

impl Drop for PriceSubscription {
	fn drop(&mut self) {
		if let Some(manager) = self.manager.upgrade() {
			manager.unsubscribe(&self.key);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Default)]
	struct NoopFactory;

	struct NoopScheduler;

	impl Scheduler for NoopScheduler {
		fn start(&self, _force: bool) {}
		fn stop(&self) {}
	}

	impl SchedulerFactory for NoopFactory {
		fn scheduler(&self, _: &str, _: Weak<dyn PriceListener>) -> Arc<dyn Scheduler> {
			Arc::new(NoopScheduler)
		}
	}

	fn prices(entries: &[(&str, f64)]) -> PriceMap {
		entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
	}

	#[test]
	fn test_equal_keys_share_a_subject() {
		let manager = CoinPriceSyncManager::new(Arc::new(NoopFactory), 8);
		let key = CoinPriceKey::new("a", ["btc"], "usd");
		let first = manager.subscribe(key.clone());
		let second = manager.subscribe(key.clone());
		assert_eq!(manager.subscription_count(&key), 2);

		drop(first);
		assert_eq!(manager.subscription_count(&key), 1);
		drop(second);
		assert_eq!(manager.subscription_count(&key), 0);
		assert_eq!(manager.scheduler_count(), 0);
	}

	#[test]
	fn test_tick_is_split_per_key() {
		let manager = CoinPriceSyncManager::new(Arc::new(NoopFactory), 8);
		let mut btc = manager.subscribe(CoinPriceKey::new("a", ["btc"], "usd"));
		let mut sol = manager.subscribe(CoinPriceKey::new("b", ["sol"], "usd"));

		manager.on_price_update(prices(&[("btc", 50_000.0), ("eth", 3_000.0)]), "usd");

		assert_eq!(btc.try_next(), Some(prices(&[("btc", 50_000.0)])));
		assert_eq!(sol.try_next(), None);
	}

	#[test]
	fn test_late_subscriber_is_primed() {
		let manager = CoinPriceSyncManager::new(Arc::new(NoopFactory), 8);
		let _keep = manager.subscribe(CoinPriceKey::new("a", ["btc", "eth"], "usd"));
		manager.on_price_update(prices(&[("btc", 1.0), ("eth", 2.0)]), "usd");

		let mut late = manager.subscribe(CoinPriceKey::new("b", ["eth"], "usd"));
		assert_eq!(late.try_next(), Some(prices(&[("eth", 2.0)])));
		assert_eq!(manager.latest_prices("usd").len(), 2);
	}

	#[test]
	fn test_combined_coin_uids() {
		let manager = CoinPriceSyncManager::new(Arc::new(NoopFactory), 8);
		let _a = manager.subscribe(CoinPriceKey::new(WALLET_TAG, ["btc"], "usd"));
		let _b = manager.subscribe(CoinPriceKey::new("market", ["eth", "btc"], "usd"));
		let _c = manager.subscribe(CoinPriceKey::new(WALLET_TAG, ["sol"], "eur"));

		let (all, wallet) = manager.combined_coin_uids("usd");
		assert_eq!(all, BTreeSet::from(["btc".to_string(), "eth".to_string()]));
		assert_eq!(wallet, BTreeSet::from(["btc".to_string()]));
	}

	#[tokio::test]
	async fn test_stream_ends_with_manager() {
		let manager = CoinPriceSyncManager::new(Arc::new(NoopFactory), 8);
		let mut stream = manager
			.subscribe(CoinPriceKey::new("a", ["btc"], "usd"))
			.into_stream();
		manager.on_price_update(prices(&[("btc", 1.0)]), "usd");
		assert_eq!(stream.next().await, Some(prices(&[("btc", 1.0)])));

		drop(manager);
		assert_eq!(stream.next().await, None);
	}
}
