//! Wallet persistence.
//!
//! The sync managers write through [`StoragePort`]. Two implementations ship with the
//! crate: [`InMemoryStorage`] for tests and ephemeral wallets, and [`FileStorage`],
//! which keeps one JSON snapshot per wallet and replaces it atomically on every write.

/// JSON snapshot storage
mod file;
/// Volatile storage and the shared state both implementations operate on
mod memory;
/// The storage trait and query filters
mod repositories;

pub use file::FileStorage;
pub use memory::InMemoryStorage;
pub use repositories::{StoragePort, TransactionFilter};

/// Errors raised by storage implementations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("Invalid wallet id '{0}'")]
	InvalidWalletId(String),
}
