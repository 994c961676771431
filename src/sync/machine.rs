//! Generic sync-state machine.
//!
//! A [`SyncStateMachine`] owns one [`SyncUnit`] (balance, token accounts, transactions)
//! and guarantees that at most one cycle of that unit is in flight. Cycles run on a
//! spawned task and publish their outcome on a replay-latest [`StateFlow`].
//!
//! All transitions happen while holding the control lock, so a cycle finishing
//! concurrently with `stop()` either publishes before the stop or not at all.

use crate::sync::events::StateFlow;
use crate::sync::state::SyncState;
use crate::sync::types::SyncError;

use futures_util::stream::BoxStream;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One unit of fetch → persist → emit work.
///
/// Implementations must only persist whole, validated batches: an error or a
/// cancellation halfway through a cycle must leave storage as it was before the
/// failing batch.
#[async_trait::async_trait]
pub trait SyncUnit: Send + Sync {
	async fn sync(&self, progress: &SyncProgress) -> Result<(), SyncError>;

	/// Name used in logs
	fn name(&self) -> &'static str;
}

/// Handle a running cycle uses to report progress and notice `stop()`.
pub struct SyncProgress {
	inner: Option<Arc<Inner>>,
}

impl SyncProgress {
	/// A handle that is never cancelled and discards reports.
	pub fn detached() -> Self {
		Self { inner: None }
	}

	/// Publishes `Syncing { progress }`.
	pub fn report(&self, progress: f64) -> Result<(), SyncError> {
		let Some(inner) = &self.inner else {
			return Ok(());
		};
		let control = inner.lock();
		if control.stopped {
			return Err(SyncError::Cancelled);
		}
		inner.state.set_if_changed(SyncState::Syncing {
			progress: Some(progress.clamp(0.0, 1.0)),
		});
		Ok(())
	}

	/// Runs `emit` unless the machine was stopped.
	///
	/// `emit` runs under the control lock, so nothing it publishes can follow a
	/// returned `stop()`. It must not block.
	pub fn publish<F: FnOnce()>(&self, emit: F) -> Result<(), SyncError> {
		let Some(inner) = &self.inner else {
			emit();
			return Ok(());
		};
		let control = inner.lock();
		if control.stopped {
			return Err(SyncError::Cancelled);
		}
		emit();
		Ok(())
	}

	/// Fails with [`SyncError::Cancelled`] once the machine was stopped.
	pub fn checkpoint(&self) -> Result<(), SyncError> {
		match &self.inner {
			Some(inner) if inner.lock().stopped => Err(SyncError::Cancelled),
			_ => Ok(()),
		}
	}
}

#[derive(Default)]
struct Control {
	started: bool,
	stopped: bool,
	running: bool,
	/// A forced refresh arrived while a cycle was running
	rerun: bool,
	task: Option<JoinHandle<()>>,
}

struct Inner {
	unit: Arc<dyn SyncUnit>,
	state: StateFlow<SyncState>,
	cycle_timeout: Duration,
	control: Mutex<Control>,
}

impl Inner {
	fn lock(&self) -> MutexGuard<'_, Control> {
		self.control.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

/// Drives one [`SyncUnit`] through `Idle → Syncing → Synced | NotSynced`.
#[derive(Clone)]
pub struct SyncStateMachine {
	inner: Arc<Inner>,
}

impl SyncStateMachine {
	pub fn new(unit: Arc<dyn SyncUnit>, cycle_timeout: Duration) -> Self {
		Self {
			inner: Arc::new(Inner {
				unit,
				state: StateFlow::new(SyncState::Idle),
				cycle_timeout,
				control: Mutex::new(Control::default()),
			}),
		}
	}

	pub fn name(&self) -> &'static str {
		self.inner.unit.name()
	}

	pub fn state(&self) -> SyncState {
		self.inner.state.value()
	}

	/// Current state first, then every transition.
	pub fn state_flow(&self) -> BoxStream<'static, SyncState> {
		self.inner.state.stream()
	}

	pub fn is_started(&self) -> bool {
		let control = self.inner.lock();
		control.started && !control.stopped
	}

	/// Leaves `Idle` and runs the first cycle. Later calls are ignored.
	pub fn start(&self) {
		let mut control = self.inner.lock();
		if control.started || control.stopped {
			return;
		}
		control.started = true;
		info!("Starting {} sync", self.name());
		self.launch(&mut control);
	}

	/// Requests another cycle.
	///
	/// While a cycle runs, a plain refresh is absorbed by it and a forced one queues
	/// exactly one more cycle after it. Ignored before `start()` and after `stop()`.
	pub fn refresh(&self, force: bool) {
		let mut control = self.inner.lock();
		if !control.started || control.stopped {
			return;
		}
		if control.running {
			if force {
				debug!("{} sync busy, queueing forced refresh", self.name());
				control.rerun = true;
			}
			return;
		}
		self.launch(&mut control);
	}

	/// Aborts the in-flight cycle. The state keeps its last value.
	pub fn stop(&self) {
		let mut control = self.inner.lock();
		if control.stopped {
			return;
		}
		control.stopped = true;
		control.running = false;
		control.rerun = false;
		if let Some(task) = control.task.take() {
			task.abort();
		}
		info!("Stopped {} sync", self.name());
	}

	fn launch(&self, control: &mut Control) {
		control.running = true;
		control.rerun = false;
		self.inner.state.set(SyncState::Syncing { progress: None });
		control.task = Some(tokio::spawn(run_cycles(self.inner.clone())));
	}
}

async fn run_cycles(inner: Arc<Inner>) {
	loop {
		let progress = SyncProgress {
			inner: Some(inner.clone()),
		};
		let result =
			match tokio::time::timeout(inner.cycle_timeout, inner.unit.sync(&progress)).await {
				Ok(result) => result,
				Err(_) => Err(SyncError::Timeout(inner.cycle_timeout)),
			};

		let mut control = inner.lock();
		if control.stopped {
			return;
		}

		if control.rerun {
			control.rerun = false;
			if let Err(e) = &result {
				warn!("{} sync failed before queued refresh: {}", inner.unit.name(), e);
			}
			inner.state.set(SyncState::Syncing { progress: None });
			continue;
		}

		control.running = false;
		control.task = None;
		match result {
			Ok(()) => {
				debug!("{} sync finished", inner.unit.name());
				inner.state.set(SyncState::Synced);
			}
			Err(e) => {
				warn!("{} sync failed: {}", inner.unit.name(), e);
				inner.state.set(SyncState::NotSynced(e));
			}
		}
		return;
	}
}
