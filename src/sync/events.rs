//! Reactive flows published by the sync managers.
//!
//! Two shapes cover every observable of a kit:
//!
//! - [`StateFlow`] holds a current value (sync state, balance, token accounts). New
//!   observers get the latest value first, then every change. Built on `tokio::sync::watch`,
//!   so a slow observer only ever sees the newest value.
//! - [`EventFlow`] carries discrete events (transaction batches) on a bounded
//!   `tokio::sync::broadcast` channel. An observer that falls behind loses the oldest
//!   events and keeps receiving from the newest retained one.

use crate::provider::TransactionRecord;

use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tokio::sync::{broadcast, watch};
use tracing::warn;

/// Records persisted by one page of a sweep, or by one reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionBatch {
	pub records: Vec<TransactionRecord>,
	/// `true` for the newest history (first page of a fresh wallet, forward pages),
	/// `false` for backfilled history and pending updates
	pub initial: bool,
}

/// Replay-latest observable value
#[derive(Debug)]
pub struct StateFlow<T> {
	tx: watch::Sender<T>,
}

impl<T> StateFlow<T>
where
	T: Clone + Send + Sync + 'static,
{
	pub fn new(initial: T) -> Self {
		let (tx, _) = watch::channel(initial);
		Self { tx }
	}

	pub fn value(&self) -> T {
		self.tx.borrow().clone()
	}

	/// Publishes `value` unconditionally.
	pub fn set(&self, value: T) {
		self.tx.send_replace(value);
	}

	/// Publishes `value` unless it equals the current one. Returns whether it did.
	pub fn set_if_changed(&self, value: T) -> bool
	where
		T: PartialEq,
	{
		self.tx.send_if_modified(|current| {
			if *current == value {
				false
			} else {
				*current = value;
				true
			}
		})
	}

	pub fn subscribe(&self) -> watch::Receiver<T> {
		self.tx.subscribe()
	}

	/// Current value first, then every published change.
	pub fn stream(&self) -> BoxStream<'static, T> {
		let mut rx = self.tx.subscribe();
		rx.mark_changed();
		stream::unfold(rx, |mut rx| async move {
			rx.changed().await.ok()?;
			let value = rx.borrow_and_update().clone();
			Some((value, rx))
		})
		.boxed()
	}
}

/// Bounded multi-observer event channel with drop-oldest overflow
#[derive(Debug)]
pub struct EventFlow<T> {
	tx: broadcast::Sender<T>,
}

impl<T> EventFlow<T>
where
	T: Clone + Send + 'static,
{
	pub fn new(capacity: usize) -> Self {
		let (tx, _) = broadcast::channel(capacity.max(1));
		Self { tx }
	}

	/// Sends to current observers. Events emitted while nobody listens are discarded.
	pub fn emit(&self, event: T) {
		let _ = self.tx.send(event);
	}

	pub fn subscribe(&self) -> broadcast::Receiver<T> {
		self.tx.subscribe()
	}

	/// Events emitted after this call. Ends when the flow is dropped.
	pub fn stream(&self) -> BoxStream<'static, T> {
		stream::unfold(self.tx.subscribe(), |mut rx| async move {
			loop {
				match rx.recv().await {
					Ok(event) => return Some((event, rx)),
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						warn!("Event observer lagged, dropped {} oldest events", skipped);
					}
					Err(broadcast::error::RecvError::Closed) => return None,
				}
			}
		})
		.boxed()
	}
}
