//! Transaction history sync.
//!
//! One cycle runs the configured sweeps in order (forward, then backward), then
//! reconciles stored pending transactions against the provider. Every page is
//! persisted before it is emitted, and a failing page aborts the cycle without
//! touching what earlier pages already committed.

use crate::config::SyncConfig;
use crate::keys::Address;
use crate::provider::{ProviderPort, TransactionRecord};
use crate::storage::{StoragePort, TransactionFilter};
use crate::sync::events::{EventFlow, TransactionBatch};
use crate::sync::machine::{SyncProgress, SyncUnit};
use crate::sync::progress_tracker::SyncProgressTracker;
use crate::sync::strategies::{BackwardSweep, ForwardSweep, SweepContext, SweepStrategy};
use crate::sync::types::SyncError;

use futures_util::StreamExt;
use itertools::Itertools;
use futures_util::stream::BoxStream;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

pub struct TransactionManager {
	address: Address,
	provider: Arc<dyn ProviderPort>,
	storage: Arc<dyn StoragePort>,
	events: EventFlow<TransactionBatch>,
	strategies: Vec<Box<dyn SweepStrategy>>,
	page_limit: usize,
	confirmation_threshold: u32,
	pending_drop_after: u32,
	/// Consecutive "unknown to the provider" answers per pending hash
	misses: Mutex<HashMap<String, u32>>,
}

impl TransactionManager {
	pub fn new(
		address: Address,
		provider: Arc<dyn ProviderPort>,
		storage: Arc<dyn StoragePort>,
		config: &SyncConfig,
	) -> Self {
		Self {
			address,
			provider,
			storage,
			events: EventFlow::new(config.event_buffer),
			strategies: vec![Box::new(ForwardSweep), Box::new(BackwardSweep)],
			page_limit: config.page_limit.max(1),
			confirmation_threshold: config.confirmation_threshold,
			pending_drop_after: config.pending_drop_after.max(1),
			misses: Mutex::new(HashMap::new()),
		}
	}

	/// Batches matching `filter`, as they are persisted. Batches with no matching
	/// record are skipped.
	pub fn transactions_flow(&self, filter: TransactionFilter) -> BoxStream<'static, TransactionBatch> {
		self.events
			.stream()
			.filter_map(move |batch| async move {
				let records: Vec<_> = batch
					.records
					.into_iter()
					.filter(|r| filter.matches(r))
					.collect();
				(!records.is_empty()).then_some(TransactionBatch {
					records,
					initial: batch.initial,
				})
			})
			.boxed()
	}

	pub async fn transactions(
		&self,
		filter: TransactionFilter,
		cursor: Option<u64>,
		limit: usize,
	) -> Result<Vec<TransactionRecord>, SyncError> {
		Ok(self.storage.query(filter, cursor, limit).await?)
	}

	fn is_confirmed(&self, remote: &TransactionRecord) -> bool {
		!remote.is_pending || remote.confirmations >= self.confirmation_threshold
	}

	/// Re-fetches stored pending transactions and applies their new status.
	async fn reconcile_pending(
		&self,
		progress: &SyncProgress,
		tracker: &mut SyncProgressTracker,
	) -> Result<(), SyncError> {
		let pending = self.storage.pending().await?;
		if pending.is_empty() {
			return Ok(());
		}
		debug!("Reconciling {} pending transactions", pending.len());

		// operations of one transaction share its hash and status
		let hashes: Vec<String> = pending.iter().map(|r| r.hash.clone()).unique().collect();
		let mut statuses = HashMap::new();
		let mut missing = Vec::new();
		for hash in hashes {
			progress.checkpoint()?;
			match self.provider.fetch_transaction(&hash).await? {
				Some(remote) => {
					statuses.insert(hash, remote);
				}
				None => missing.push(hash),
			}
		}

		let mut updated = Vec::new();
		for record in pending {
			let Some(remote) = statuses.get(&record.hash) else {
				continue;
			};
			let mut next = record.clone();
			next.confirmations = remote.confirmations;
			next.block_height = remote.block_height.or(record.block_height);
			if remote.fee > 0 {
				next.fee = remote.fee;
			}
			next.is_pending = !self.is_confirmed(remote);
			if next != record {
				updated.push(next);
			}
		}

		// miss counters only move once the whole pass succeeded
		let dropped: Vec<String> = {
			let mut misses = self.misses.lock().unwrap_or_else(PoisonError::into_inner);
			for hash in statuses.keys() {
				misses.remove(hash);
			}
			missing
				.into_iter()
				.filter(|hash| {
					let count = misses.entry(hash.clone()).or_insert(0);
					*count += 1;
					*count >= self.pending_drop_after
				})
				.collect()
		};

		progress.checkpoint()?;
		if !updated.is_empty() {
			self.storage.save_transactions(&updated).await?;
		}
		if !dropped.is_empty() {
			self.storage.remove_transactions(&dropped).await?;
			let mut misses = self.misses.lock().unwrap_or_else(PoisonError::into_inner);
			for hash in &dropped {
				misses.remove(hash);
			}
			warn!(
				"Dropped {} pending transactions unknown to the provider",
				dropped.len()
			);
		}

		let confirmed = updated.iter().filter(|r| !r.is_pending).count();
		tracker.record_reconciliation(confirmed, dropped.len());
		if !updated.is_empty() {
			progress.publish(|| {
				self.events.emit(TransactionBatch {
					records: updated,
					initial: false,
				})
			})?;
		}
		Ok(())
	}
}

#[async_trait::async_trait]
impl SyncUnit for TransactionManager {
	async fn sync(&self, progress: &SyncProgress) -> Result<(), SyncError> {
		let mut tracker = SyncProgressTracker::new(self.strategies.len() + 1);
		let ctx = SweepContext {
			address: &self.address,
			provider: self.provider.as_ref(),
			storage: self.storage.as_ref(),
			events: &self.events,
			page_limit: self.page_limit,
			progress,
		};

		for strategy in &self.strategies {
			debug!("Running {} sweep for {}", strategy.name(), self.address);
			strategy.sweep(&ctx, &mut tracker).await?;
			tracker.complete_phase();
			progress.report(tracker.progress())?;
		}

		self.reconcile_pending(progress, &mut tracker).await?;
		tracker.complete_phase();

		let stats = tracker.get_stats();
		if stats.pages_fetched > 0 || stats.pending_confirmed + stats.pending_dropped > 0 {
			info!("Transaction sync of {}: {}", self.address, stats.summary());
		}
		Ok(())
	}

	fn name(&self) -> &'static str {
		"transactions"
	}
}
