use crate::keys::Address;
use crate::provider::{Balance, ProviderPort};
use crate::storage::StoragePort;
use crate::sync::events::StateFlow;
use crate::sync::machine::{SyncProgress, SyncUnit};
use crate::sync::types::SyncError;

use futures_util::stream::BoxStream;
use std::sync::Arc;
use tracing::{debug, info};

/// Keeps the native balance of an address in storage and on a flow.
///
/// Only a changed amount is written and emitted; a new observation height alone is
/// not a change.
pub struct BalanceManager {
	address: Address,
	provider: Arc<dyn ProviderPort>,
	storage: Arc<dyn StoragePort>,
	flow: StateFlow<Option<Balance>>,
}

impl BalanceManager {
	/// Creates the manager with the stored balance as the flow's first value.
	pub async fn new(
		address: Address,
		provider: Arc<dyn ProviderPort>,
		storage: Arc<dyn StoragePort>,
	) -> Result<Self, SyncError> {
		let cached = storage.balance().await?;
		Ok(Self {
			address,
			provider,
			storage,
			flow: StateFlow::new(cached),
		})
	}

	pub fn balance(&self) -> Option<Balance> {
		self.flow.value()
	}

	pub fn balance_flow(&self) -> BoxStream<'static, Option<Balance>> {
		self.flow.stream()
	}
}

#[async_trait::async_trait]
impl SyncUnit for BalanceManager {
	async fn sync(&self, progress: &SyncProgress) -> Result<(), SyncError> {
		let fresh = self.provider.fetch_balance(&self.address).await?;
		let stored = self.storage.balance().await?;

		if stored.as_ref().map(|b| b.amount) == Some(fresh.amount) {
			debug!("Balance of {} unchanged", self.address);
			return Ok(());
		}

		progress.checkpoint()?;
		self.storage.save_balance(&fresh).await?;
		info!("Balance of {} is now {}", self.address, fresh.amount);
		progress.publish(|| self.flow.set(Some(fresh)))
	}

	fn name(&self) -> &'static str {
		"balance"
	}
}
