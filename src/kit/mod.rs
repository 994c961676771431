//! Kit facade composing key derivation, storage, providers and sync units per wallet.

/// Kit construction and lifecycle
mod orchestrator;

pub use orchestrator::{Kit, KitError, KitParams};
