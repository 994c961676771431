//! Multi-chain wallet sync engine.
//!
//! A [`Kit`] derives one wallet's address from a seed, then keeps its balance, token
//! accounts and transaction history in sync with a remote provider, persisting every
//! change before publishing it. Coin prices are synced independently by
//! [`price::CoinPriceSyncManager`], shared across kits.

pub mod config;
pub mod keys;
pub mod kit;
pub mod price;
pub mod provider;
pub mod storage;
pub mod sync;
pub mod utils;
pub mod validation;

pub use kit::{Kit, KitError, KitParams};
