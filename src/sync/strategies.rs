use crate::keys::Address;
use crate::provider::{Order, ProviderPort, TransactionRecord};
use crate::storage::StoragePort;
use crate::sync::events::{EventFlow, TransactionBatch};
use crate::sync::machine::SyncProgress;
use crate::sync::progress_tracker::SyncProgressTracker;
use crate::sync::types::SyncError;

use tracing::{debug, info};

/// Everything a sweep needs for one cycle
pub struct SweepContext<'a> {
	pub address: &'a Address,
	pub provider: &'a dyn ProviderPort,
	pub storage: &'a dyn StoragePort,
	pub events: &'a EventFlow<TransactionBatch>,
	pub page_limit: usize,
	pub progress: &'a SyncProgress,
}

impl SweepContext<'_> {
	/// Persists a page, then announces it. Empty pages are neither.
	async fn commit_page(
		&self,
		records: Vec<TransactionRecord>,
		initial: bool,
		tracker: &mut SyncProgressTracker,
	) -> Result<(), SyncError> {
		tracker.record_page(records.iter().map(|r| r.paging_token));
		if records.is_empty() {
			return Ok(());
		}
		// nothing of a cancelled cycle is persisted past this point
		self.progress.checkpoint()?;
		self.storage.save_transactions(&records).await?;
		self.progress
			.publish(|| self.events.emit(TransactionBatch { records, initial }))?;
		tracker.log_progress(false);
		Ok(())
	}
}

/// Trait for the paginated history sweeps of the transaction manager
#[async_trait::async_trait]
pub trait SweepStrategy: Send + Sync {
	async fn sweep(
		&self,
		ctx: &SweepContext<'_>,
		tracker: &mut SyncProgressTracker,
	) -> Result<(), SyncError>;

	/// Get the name of this strategy
	fn name(&self) -> &'static str;
}

/// Fetches history newer than the newest stored record, oldest first.
///
/// Skipped on an empty store: the backward sweep starts from the top in that case.
pub struct ForwardSweep;

#[async_trait::async_trait]
impl SweepStrategy for ForwardSweep {
	async fn sweep(
		&self,
		ctx: &SweepContext<'_>,
		tracker: &mut SyncProgressTracker,
	) -> Result<(), SyncError> {
		let Some(latest) = ctx.storage.latest().await? else {
			debug!("No stored transactions, skipping forward sweep");
			return Ok(());
		};

		let mut cursor = latest.paging_token;
		loop {
			ctx.progress.checkpoint()?;
			let page = ctx
				.provider
				.fetch_operations(ctx.address, Some(cursor), ctx.page_limit, Order::Asc)
				.await?;
			let fetched = page.len();
			if let Some(last) = page.iter().map(|r| r.paging_token).max() {
				cursor = last;
			}

			ctx.commit_page(page, true, tracker).await?;

			if fetched < ctx.page_limit {
				break;
			}
		}

		Ok(())
	}

	fn name(&self) -> &'static str {
		"forward"
	}
}

/// Fetches history older than the oldest stored record, newest first, until the
/// provider runs out.
///
/// Marks the store as fully synced on the first short page; later cycles skip it.
pub struct BackwardSweep;

#[async_trait::async_trait]
impl SweepStrategy for BackwardSweep {
	async fn sweep(
		&self,
		ctx: &SweepContext<'_>,
		tracker: &mut SyncProgressTracker,
	) -> Result<(), SyncError> {
		if ctx.storage.is_all_synced().await? {
			return Ok(());
		}

		let mut cursor = ctx.storage.oldest().await?.map(|r| r.paging_token);
		// A fresh wallet sees the top of its history first
		let mut initial = cursor.is_none();

		loop {
			ctx.progress.checkpoint()?;
			let page = ctx
				.provider
				.fetch_operations(ctx.address, cursor, ctx.page_limit, Order::Desc)
				.await?;
			let fetched = page.len();
			if let Some(first) = page.iter().map(|r| r.paging_token).min() {
				cursor = Some(first);
			}

			ctx.commit_page(page, initial, tracker).await?;
			initial = false;

			if fetched < ctx.page_limit {
				ctx.storage.mark_all_synced().await?;
				info!("Reached the start of history for {}", ctx.address);
				break;
			}
		}

		Ok(())
	}

	fn name(&self) -> &'static str {
		"backward"
	}
}
