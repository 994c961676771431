use crate::config::MIN_INTERVAL;
use crate::price::manager::{PriceListener, Scheduler, SchedulerFactory};
use crate::provider::{PriceProvider, ProviderError};

use backoff::{ExponentialBackoff, future::retry};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Polls a [`PriceProvider`] for one currency on a fixed interval.
///
/// The coins to fetch are asked from the listener on every tick, so subscriptions
/// added between ticks are picked up without restarting the scheduler.
pub struct PollingScheduler {
	currency_code: String,
	provider: Arc<dyn PriceProvider>,
	listener: Weak<dyn PriceListener>,
	interval: Duration,
	backoff: ExponentialBackoff,
	wake: Arc<Notify>,
	task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingScheduler {
	pub fn new(
		currency_code: &str,
		provider: Arc<dyn PriceProvider>,
		listener: Weak<dyn PriceListener>,
		interval: Duration,
		backoff: ExponentialBackoff,
	) -> Self {
		Self {
			currency_code: currency_code.to_string(),
			provider,
			listener,
			interval: interval.max(MIN_INTERVAL),
			backoff,
			wake: Arc::new(Notify::new()),
			task: Mutex::new(None),
		}
	}

	pub fn is_running(&self) -> bool {
		self.task
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.as_ref()
			.is_some_and(|task| !task.is_finished())
	}
}

impl Scheduler for PollingScheduler {
	fn start(&self, force: bool) {
		let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
		if task.as_ref().is_some_and(|task| !task.is_finished()) {
			if force {
				self.wake.notify_one();
			}
			return;
		}

		// A forced start ticks right away, a plain one after one interval
		let first_tick = if force {
			Instant::now()
		} else {
			Instant::now() + self.interval
		};
		*task = Some(tokio::spawn(poll(
			self.currency_code.clone(),
			self.provider.clone(),
			self.listener.clone(),
			first_tick,
			self.interval,
			self.backoff.clone(),
			self.wake.clone(),
		)));
	}

	fn stop(&self) {
		if let Some(task) = self
			.task
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take()
		{
			task.abort();
		}
	}
}

impl Drop for PollingScheduler {
	fn drop(&mut self) {
		self.stop();
	}
}

async fn poll(
	currency_code: String,
	provider: Arc<dyn PriceProvider>,
	listener: Weak<dyn PriceListener>,
	first_tick: Instant,
	interval: Duration,
	backoff: ExponentialBackoff,
	wake: Arc<Notify>,
) {
	let mut ticker = tokio::time::interval_at(first_tick, interval);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		tokio::select! {
			_ = ticker.tick() => {}
			_ = wake.notified() => {}
		}

		let coin_uids: Vec<String> = match listener.upgrade() {
			Some(listener) => listener.coin_uids(&currency_code).into_iter().collect(),
			None => return,
		};
		if coin_uids.is_empty() {
			continue;
		}

		let result = retry(backoff.clone(), || async {
			provider
				.fetch_prices(&coin_uids, &currency_code)
				.await
				.map_err(|e: ProviderError| {
					if e.is_transient() {
						backoff::Error::transient(e)
					} else {
						backoff::Error::permanent(e)
					}
				})
		})
		.await;

		match result {
			Ok(prices) => {
				debug!("Fetched {} {} prices", prices.len(), currency_code);
				match listener.upgrade() {
					Some(listener) => listener.on_price_update(prices, &currency_code),
					None => return,
				}
			}
			Err(e) => warn!("Price fetch for {} failed: {}", currency_code, e),
		}
	}
}

/// Builds a [`PollingScheduler`] per currency, all sharing one provider.
pub struct PollingSchedulerFactory {
	provider: Arc<dyn PriceProvider>,
	interval: Duration,
	backoff: ExponentialBackoff,
}

impl PollingSchedulerFactory {
	pub fn new(provider: Arc<dyn PriceProvider>, interval: Duration) -> Self {
		Self {
			provider,
			interval,
			backoff: ExponentialBackoff {
				max_elapsed_time: Some(interval),
				..ExponentialBackoff::default()
			},
		}
	}

	pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
		self.backoff = backoff;
		self
	}
}

impl SchedulerFactory for PollingSchedulerFactory {
	fn scheduler(
		&self,
		currency_code: &str,
		listener: Weak<dyn PriceListener>,
	) -> Arc<dyn Scheduler> {
		Arc::new(PollingScheduler::new(
			currency_code,
			self.provider.clone(),
			listener,
			self.interval,
			self.backoff.clone(),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::provider::PriceMap;
	use std::collections::BTreeSet;
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct CountingProvider {
		calls: AtomicUsize,
	}

	#[async_trait::async_trait]
	impl PriceProvider for CountingProvider {
		async fn fetch_prices(
			&self,
			coin_uids: &[String],
			_currency_code: &str,
		) -> Result<PriceMap, ProviderError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Ok(coin_uids.iter().map(|uid| (uid.clone(), 1.0)).collect())
		}
	}

	#[derive(Default)]
	struct RecordingListener {
		ticks: Mutex<Vec<PriceMap>>,
	}

	impl PriceListener for RecordingListener {
		fn on_price_update(&self, prices: PriceMap, _currency_code: &str) {
			self.ticks.lock().unwrap().push(prices);
		}

		fn coin_uids(&self, _currency_code: &str) -> BTreeSet<String> {
			BTreeSet::from(["btc".to_string()])
		}
	}

	fn setup() -> (Arc<CountingProvider>, Arc<RecordingListener>, PollingScheduler) {
		setup_with_interval(Duration::from_secs(60))
	}

	fn setup_with_interval(
		interval: Duration,
	) -> (Arc<CountingProvider>, Arc<RecordingListener>, PollingScheduler) {
		let provider = Arc::new(CountingProvider {
			calls: AtomicUsize::new(0),
		});
		let listener = Arc::new(RecordingListener::default());
		let weak: Weak<dyn PriceListener> = Arc::downgrade(&listener) as Weak<dyn PriceListener>;
		let scheduler = PollingScheduler::new(
			"usd",
			provider.clone(),
			weak,
			interval,
			ExponentialBackoff::default(),
		);
		(provider, listener, scheduler)
	}

	#[tokio::test(start_paused = true)]
	async fn test_forced_start_ticks_immediately() {
		let (provider, listener, scheduler) = setup();
		scheduler.start(true);
		tokio::time::sleep(Duration::from_millis(10)).await;
		assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
		assert_eq!(listener.ticks.lock().unwrap().len(), 1);

		tokio::time::sleep(Duration::from_secs(60)).await;
		assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
		scheduler.stop();
		assert!(!scheduler.is_running());
	}

	#[tokio::test(start_paused = true)]
	async fn test_plain_start_waits_one_interval() {
		let (provider, _listener, scheduler) = setup();
		scheduler.start(false);
		tokio::time::sleep(Duration::from_secs(30)).await;
		assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

		// forcing a running scheduler wakes it up
		scheduler.start(true);
		tokio::time::sleep(Duration::from_millis(10)).await;
		assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_stops_when_listener_is_gone() {
		let (provider, listener, scheduler) = setup();
		drop(listener);
		scheduler.start(true);
		tokio::time::sleep(Duration::from_millis(10)).await;
		assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
		assert!(!scheduler.is_running());
	}

	#[tokio::test(start_paused = true)]
	async fn test_zero_interval_is_raised_to_minimum() {
		let (provider, _listener, scheduler) = setup_with_interval(Duration::ZERO);
		scheduler.start(true);
		tokio::time::sleep(Duration::from_millis(10)).await;
		assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
		assert!(scheduler.is_running());

		tokio::time::sleep(MIN_INTERVAL).await;
		assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
	}
}
