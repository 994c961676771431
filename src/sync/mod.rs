//! Sync engine.
//!
//! Each sync unit (balance, token accounts, transactions) is wrapped in its own
//! [`SyncStateMachine`], which serializes its cycles and publishes a [`SyncState`].
//! Units fetch from a [`ProviderPort`](crate::provider::ProviderPort), persist through a
//! [`StoragePort`](crate::storage::StoragePort) and only then emit on their flows.

pub mod balance;
pub mod events;
pub mod machine;
pub mod progress_tracker;
pub mod state;
pub mod strategies;
pub mod token_accounts;
pub mod transactions;
pub mod types;

pub use balance::BalanceManager;
pub use events::{EventFlow, StateFlow, TransactionBatch};
pub use machine::{SyncProgress, SyncStateMachine, SyncUnit};
pub use progress_tracker::{SyncProgressTracker, SyncStats};
pub use state::SyncState;
pub use strategies::{BackwardSweep, ForwardSweep, SweepContext, SweepStrategy};
pub use token_accounts::TokenAccountsManager;
pub use transactions::TransactionManager;
pub use types::SyncError;
