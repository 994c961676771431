use crate::sync::types::SyncError;

use std::fmt;
use std::mem;

/// Lifecycle of one sync unit.
///
/// Equality is what observers care about: two `Syncing` states differ only by
/// progress, and two `NotSynced` states are equal when their errors are the same
/// variant, whatever the message.
#[derive(Debug, Clone, Default)]
pub enum SyncState {
	#[default]
	Idle,
	Synced,
	Syncing {
		/// Fraction in `0.0..=1.0` when known
		progress: Option<f64>,
	},
	NotSynced(SyncError),
}

impl SyncState {
	pub fn is_syncing(&self) -> bool {
		matches!(self, SyncState::Syncing { .. })
	}

	pub fn is_synced(&self) -> bool {
		matches!(self, SyncState::Synced)
	}

	pub fn error(&self) -> Option<&SyncError> {
		match self {
			SyncState::NotSynced(error) => Some(error),
			_ => None,
		}
	}
}

impl PartialEq for SyncState {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(SyncState::Idle, SyncState::Idle) => true,
			(SyncState::Synced, SyncState::Synced) => true,
			(SyncState::Syncing { progress: a }, SyncState::Syncing { progress: b }) => a == b,
			(SyncState::NotSynced(a), SyncState::NotSynced(b)) => {
				mem::discriminant(a) == mem::discriminant(b)
			}
			_ => false,
		}
	}
}

impl fmt::Display for SyncState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncState::Idle => write!(f, "idle"),
			SyncState::Synced => write!(f, "synced"),
			SyncState::Syncing { progress: None } => write!(f, "syncing"),
			SyncState::Syncing {
				progress: Some(progress),
			} => write!(f, "syncing ({:.0}%)", progress * 100.0),
			SyncState::NotSynced(error) => write!(f, "not synced: {}", error),
		}
	}
}
