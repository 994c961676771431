mod common;

use common::{MockProvider, seed, wait_for_state};
use futures_util::StreamExt;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use wallet_sync::config::SyncConfig;
use wallet_sync::keys::Network;
use wallet_sync::provider::Balance;
use wallet_sync::storage::{FileStorage, InMemoryStorage, StoragePort, TransactionFilter};
use wallet_sync::sync::{BalanceManager, SyncError, SyncProgress, SyncState, SyncStateMachine, SyncUnit};
use wallet_sync::{Kit, KitParams};

fn params(wallet_id: &str) -> KitParams {
	KitParams {
		seed: seed(),
		network: Network::Stellar,
		wallet_id: wallet_id.to_string(),
		account_path: None,
	}
}

async fn balance_machine(provider: &Arc<MockProvider>) -> SyncStateMachine {
	let manager = BalanceManager::new(
		common::address(),
		provider.clone(),
		Arc::new(InMemoryStorage::new()),
	)
	.await
	.unwrap();
	SyncStateMachine::new(Arc::new(manager), Duration::from_secs(60))
}

#[tokio::test]
async fn test_balance_is_emitted_once_per_change() {
	let provider = Arc::new(MockProvider::default());
	*provider.balance.lock().unwrap() = 5;
	let storage = Arc::new(InMemoryStorage::new());
	let manager = BalanceManager::new(common::address(), provider.clone(), storage.clone())
		.await
		.unwrap();
	let mut flow = manager.balance_flow();
	assert_eq!(flow.next().await, Some(None));

	manager.sync(&SyncProgress::detached()).await.unwrap();
	manager.sync(&SyncProgress::detached()).await.unwrap();

	let expected = Balance {
		amount: 5,
		height: None,
	};
	assert_eq!(flow.next().await, Some(Some(expected.clone())));
	assert!(
		tokio::time::timeout(Duration::from_millis(50), flow.next())
			.await
			.is_err()
	);
	assert_eq!(storage.balance().await.unwrap(), Some(expected));
}

#[tokio::test(start_paused = true)]
async fn test_refreshes_coalesce_into_running_cycle() {
	let provider = Arc::new(MockProvider::default());
	*provider.delay.lock().unwrap() = Duration::from_secs(1);
	let machine = balance_machine(&provider).await;

	machine.start();
	tokio::time::sleep(Duration::from_millis(10)).await;
	for _ in 0..3 {
		machine.refresh(false);
	}
	tokio::time::sleep(Duration::from_secs(2)).await;
	assert_eq!(provider.balance_calls.load(Ordering::SeqCst), 1);
	assert_eq!(machine.state(), SyncState::Synced);

	// forced refreshes during a cycle queue exactly one more
	machine.refresh(false);
	tokio::time::sleep(Duration::from_millis(10)).await;
	machine.refresh(true);
	machine.refresh(true);
	tokio::time::sleep(Duration::from_secs(5)).await;
	assert_eq!(provider.balance_calls.load(Ordering::SeqCst), 3);
	assert_eq!(machine.state(), SyncState::Synced);
}

#[tokio::test(start_paused = true)]
async fn test_stop_freezes_in_flight_cycle() {
	let provider = Arc::new(MockProvider::default());
	*provider.delay.lock().unwrap() = Duration::from_secs(1);
	let machine = balance_machine(&provider).await;

	machine.start();
	tokio::time::sleep(Duration::from_millis(10)).await;
	machine.stop();
	tokio::time::sleep(Duration::from_secs(5)).await;

	assert_eq!(machine.state(), SyncState::Syncing { progress: None });
	machine.refresh(true);
	tokio::time::sleep(Duration::from_secs(5)).await;
	assert_eq!(provider.balance_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_cycle_times_out() {
	let provider = Arc::new(MockProvider::default());
	*provider.delay.lock().unwrap() = Duration::from_secs(120);
	let machine = balance_machine(&provider).await;

	machine.start();
	tokio::time::sleep(Duration::from_secs(61)).await;
	assert!(matches!(
		machine.state().error(),
		Some(SyncError::Timeout(_))
	));
}

#[tokio::test]
async fn test_kit_refresh_requires_start() {
	let provider = MockProvider::with_history(3);
	let kit = Kit::new(
		params("kit-a"),
		Arc::new(InMemoryStorage::new()),
		provider,
		SyncConfig::default(),
	)
	.await
	.unwrap();

	assert!(!kit.is_started());
	assert!(matches!(kit.refresh(), Err(SyncError::NotStarted)));
	assert_eq!(kit.balance_sync_state(), SyncState::Idle);
}

#[tokio::test]
async fn test_kit_syncs_every_unit() {
	let provider = MockProvider::with_history(30);
	*provider.balance.lock().unwrap() = 1_000;
	let kit = Kit::new(
		params("kit-b"),
		Arc::new(InMemoryStorage::new()),
		provider.clone(),
		SyncConfig::default(),
	)
	.await
	.unwrap();
	assert_eq!(kit.address().as_str(), common::address().as_str());

	kit.start();
	assert!(kit.is_started());
	wait_for_state(kit.balance_sync_state_flow(), SyncState::is_synced).await;
	wait_for_state(kit.token_accounts_sync_state_flow(), SyncState::is_synced).await;
	wait_for_state(kit.transactions_sync_state_flow(), SyncState::is_synced).await;

	assert_eq!(kit.balance().map(|b| b.amount), Some(1_000));
	let stored = kit.transactions(TransactionFilter::All, None, 100).await.unwrap();
	assert_eq!(stored.len(), 30);

	kit.refresh().unwrap();
	wait_for_state(kit.transactions_sync_state_flow(), SyncState::is_synced).await;

	kit.stop();
	assert!(!kit.is_started());
	kit.start();
	assert!(!kit.is_started());
}

#[tokio::test]
async fn test_kit_restores_cached_state() {
	let dir = tempfile::tempdir().unwrap();
	let provider = MockProvider::with_history(12);
	*provider.balance.lock().unwrap() = 42;

	{
		let storage = Arc::new(FileStorage::open(dir.path(), "cached").await.unwrap());
		let kit = Kit::new(params("cached"), storage, provider.clone(), SyncConfig::default())
			.await
			.unwrap();
		kit.start();
		wait_for_state(kit.balance_sync_state_flow(), SyncState::is_synced).await;
		wait_for_state(kit.transactions_sync_state_flow(), SyncState::is_synced).await;
	}

	let storage = Arc::new(FileStorage::open(dir.path(), "cached").await.unwrap());
	let kit = Kit::new(params("cached"), storage, provider, SyncConfig::default())
		.await
		.unwrap();
	assert_eq!(kit.balance().map(|b| b.amount), Some(42));
	let stored = kit.transactions(TransactionFilter::All, None, 100).await.unwrap();
	assert_eq!(stored.len(), 12);
}

#[tokio::test]
async fn test_stellar_has_single_receive_address() {
	let kit = Kit::new(
		params("kit-c"),
		Arc::new(InMemoryStorage::new()),
		Arc::new(MockProvider::default()),
		SyncConfig::default(),
	)
	.await
	.unwrap();

	assert_eq!(kit.receive_address(0).unwrap(), *kit.address());
	assert!(kit.receive_address(1).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_kit_with_zero_intervals_still_polls() {
	let provider = MockProvider::with_history(2);
	let config = SyncConfig {
		poll_interval_secs: 0,
		request_timeout_secs: 0,
		..SyncConfig::default()
	};
	let kit = Kit::new(params("kit-d"), Arc::new(InMemoryStorage::new()), provider.clone(), config)
		.await
		.unwrap();

	kit.start();
	tokio::time::sleep(Duration::from_millis(10)).await;
	assert_eq!(kit.balance_sync_state(), SyncState::Synced);
	assert_eq!(provider.balance_calls.load(Ordering::SeqCst), 1);

	// periodic refreshes run at the minimum interval
	tokio::time::sleep(Duration::from_millis(1_500)).await;
	assert_eq!(provider.balance_calls.load(Ordering::SeqCst), 2);
	kit.stop();
}
