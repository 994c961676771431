use crate::keys::Address;
use crate::provider::{ProviderPort, TokenAccount};
use crate::storage::StoragePort;
use crate::sync::events::StateFlow;
use crate::sync::machine::{SyncProgress, SyncUnit};
use crate::sync::types::SyncError;

use futures_util::stream::BoxStream;
use std::sync::Arc;
use tracing::{debug, info};

/// Same contract as [`BalanceManager`](crate::sync::BalanceManager) for non-native
/// asset balances. Accounts are kept sorted by mint so order changes are not changes.
pub struct TokenAccountsManager {
	address: Address,
	provider: Arc<dyn ProviderPort>,
	storage: Arc<dyn StoragePort>,
	flow: StateFlow<Vec<TokenAccount>>,
}

impl TokenAccountsManager {
	pub async fn new(
		address: Address,
		provider: Arc<dyn ProviderPort>,
		storage: Arc<dyn StoragePort>,
	) -> Result<Self, SyncError> {
		let cached = sorted(storage.token_accounts().await?);
		Ok(Self {
			address,
			provider,
			storage,
			flow: StateFlow::new(cached),
		})
	}

	pub fn token_accounts(&self) -> Vec<TokenAccount> {
		self.flow.value()
	}

	pub fn token_accounts_flow(&self) -> BoxStream<'static, Vec<TokenAccount>> {
		self.flow.stream()
	}
}

fn sorted(mut accounts: Vec<TokenAccount>) -> Vec<TokenAccount> {
	accounts.sort_by(|a, b| a.mint.cmp(&b.mint));
	accounts
}

#[async_trait::async_trait]
impl SyncUnit for TokenAccountsManager {
	async fn sync(&self, progress: &SyncProgress) -> Result<(), SyncError> {
		let fresh = sorted(self.provider.fetch_token_accounts(&self.address).await?);
		let stored = sorted(self.storage.token_accounts().await?);

		if stored == fresh {
			debug!("Token accounts of {} unchanged", self.address);
			return Ok(());
		}

		progress.checkpoint()?;
		self.storage.save_token_accounts(&fresh).await?;
		info!(
			"Token accounts of {} changed ({} accounts)",
			self.address,
			fresh.len()
		);
		progress.publish(|| self.flow.set(fresh))
	}

	fn name(&self) -> &'static str {
		"token-accounts"
	}
}
