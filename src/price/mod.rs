//! Coin price synchronization.
//!
//! [`CoinPriceSyncManager`] multiplexes price subscriptions onto one scheduler per
//! currency; [`PollingScheduler`] is the bundled scheduler, polling a
//! [`PriceProvider`](crate::provider::PriceProvider) on an interval.

pub mod manager;
pub mod scheduler;

pub use manager::{
	CoinPriceKey, CoinPriceSyncManager, PriceListener, PriceSubscription, Scheduler,
	SchedulerFactory, WALLET_TAG,
};
pub use scheduler::{PollingScheduler, PollingSchedulerFactory};
