//! Remote data providers.
//!
//! The sync managers and the price manager only see the [`ProviderPort`] and
//! [`PriceProvider`] traits. [`HttpProvider`] is the bundled implementation for
//! Horizon-style account APIs and CoinGecko-style price APIs.

/// HTTP implementation of the provider ports
mod client;
/// Provider traits consumed by the sync engine
mod port;
/// Wire-independent record types and provider errors
mod types;

pub use client::HttpProvider;
pub use port::{PriceProvider, ProviderPort};
pub use types::*;
