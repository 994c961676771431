//! Progress tracking for transaction synchronization.
//!
//! A transaction sync cycle runs a fixed sequence of phases (forward sweep, backward
//! sweep, pending reconciliation). The `SyncProgressTracker` counts the pages and
//! records each phase handled, remembers the paging-token range it covered, and turns
//! finished phases into the progress fraction published in `SyncState::Syncing`.

use tracing::{debug, info};

/// Pages between two periodic progress log lines
const LOG_EVERY_PAGES: usize = 10;

/// Per-cycle progress of the transaction manager
#[derive(Debug, Clone)]
pub struct SyncProgressTracker {
	/// Number of phases the cycle runs
	phase_count: usize,
	/// Phases finished so far
	completed_phases: usize,
	pages_fetched: usize,
	records_saved: usize,
	pending_confirmed: usize,
	pending_dropped: usize,
	/// Lowest and highest paging token seen in this cycle
	token_range: Option<(u64, u64)>,
	/// Page count at the last log line
	last_logged_page: usize,
}

impl SyncProgressTracker {
	pub fn new(phase_count: usize) -> Self {
		Self {
			phase_count: phase_count.max(1),
			completed_phases: 0,
			pages_fetched: 0,
			records_saved: 0,
			pending_confirmed: 0,
			pending_dropped: 0,
			token_range: None,
			last_logged_page: 0,
		}
	}

	/// Record a persisted page and the paging tokens it contained.
	pub fn record_page(&mut self, tokens: impl IntoIterator<Item = u64>) {
		self.pages_fetched += 1;
		for token in tokens {
			self.records_saved += 1;
			self.token_range = Some(match self.token_range {
				Some((low, high)) => (low.min(token), high.max(token)),
				None => (token, token),
			});
		}
	}

	pub fn record_reconciliation(&mut self, confirmed: usize, dropped: usize) {
		self.pending_confirmed += confirmed;
		self.pending_dropped += dropped;
	}

	pub fn complete_phase(&mut self) {
		self.completed_phases = (self.completed_phases + 1).min(self.phase_count);
	}

	/// Fraction of phases finished, in `0.0..=1.0`
	pub fn progress(&self) -> f64 {
		self.completed_phases as f64 / self.phase_count as f64
	}

	/// Log progress every few pages, or when forced
	pub fn log_progress(&mut self, force: bool) {
		let pages_since_last_log = self.pages_fetched.saturating_sub(self.last_logged_page);
		if force || pages_since_last_log >= LOG_EVERY_PAGES {
			info!("Transaction sync progress: {}", self.get_stats().summary());
			self.last_logged_page = self.pages_fetched;
		} else {
			debug!(
				"Transaction sync: {} pages, {} records",
				self.pages_fetched, self.records_saved
			);
		}
	}

	pub fn get_stats(&self) -> SyncStats {
		SyncStats {
			phases_completed: self.completed_phases,
			phase_count: self.phase_count,
			pages_fetched: self.pages_fetched,
			records_saved: self.records_saved,
			pending_confirmed: self.pending_confirmed,
			pending_dropped: self.pending_dropped,
			token_range: self.token_range,
		}
	}
}

/// Snapshot of a [`SyncProgressTracker`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStats {
	pub phases_completed: usize,
	pub phase_count: usize,
	pub pages_fetched: usize,
	pub records_saved: usize,
	pub pending_confirmed: usize,
	pub pending_dropped: usize,
	pub token_range: Option<(u64, u64)>,
}

impl SyncStats {
	/// Get a human-readable summary of the sync statistics
	pub fn summary(&self) -> String {
		format!(
			"phase {}/{}: {} pages, {} records{}{}",
			self.phases_completed,
			self.phase_count,
			self.pages_fetched,
			self.records_saved,
			match self.token_range {
				Some((low, high)) => format!(" (tokens {}..={})", low, high),
				None => String::new(),
			},
			if self.pending_confirmed + self.pending_dropped > 0 {
				format!(
					", {} confirmed, {} dropped",
					self.pending_confirmed, self.pending_dropped
				)
			} else {
				String::new()
			}
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_tracks_pages_and_range() {
		let mut tracker = SyncProgressTracker::new(3);
		tracker.record_page([10, 11, 12]);
		tracker.record_page([5, 6]);
		tracker.record_page([]);

		let stats = tracker.get_stats();
		assert_eq!(stats.pages_fetched, 3);
		assert_eq!(stats.records_saved, 5);
		assert_eq!(stats.token_range, Some((5, 12)));
		assert_eq!(
			stats.summary(),
			"phase 0/3: 3 pages, 5 records (tokens 5..=12)"
		);
	}

	#[test]
	fn test_progress_is_phase_fraction() {
		let mut tracker = SyncProgressTracker::new(4);
		assert_eq!(tracker.progress(), 0.0);
		tracker.complete_phase();
		assert_eq!(tracker.progress(), 0.25);
		for _ in 0..10 {
			tracker.complete_phase();
		}
		assert_eq!(tracker.progress(), 1.0);
	}
}
