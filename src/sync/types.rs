use crate::provider::ProviderError;
use crate::storage::StorageError;

use std::time::Duration;

/// Why a sync cycle did not complete.
///
/// Carried inside [`SyncState::NotSynced`](crate::sync::SyncState), so it is `Clone`
/// and keeps lower-layer errors as messages.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
	#[error("Sync has not been started")]
	NotStarted,

	#[error("No network connection: {0}")]
	NoNetworkConnection(String),

	#[error("Sync cycle timed out after {0:?}")]
	Timeout(Duration),

	#[error("Provider error: {0}")]
	Provider(String),

	#[error("Storage error: {0}")]
	Storage(String),

	#[error("Sync was cancelled")]
	Cancelled,
}

impl SyncError {
	/// Errors worth retrying on the next tick without user action.
	pub fn is_recoverable(&self) -> bool {
		!matches!(self, SyncError::Storage(_) | SyncError::Cancelled)
	}
}

impl From<ProviderError> for SyncError {
	fn from(error: ProviderError) -> Self {
		if error.is_connectivity() {
			SyncError::NoNetworkConnection(error.to_string())
		} else {
			SyncError::Provider(error.to_string())
		}
	}
}

impl From<StorageError> for SyncError {
	fn from(error: StorageError) -> Self {
		SyncError::Storage(error.to_string())
	}
}
