//! Key derivation and wallet identity.
//!
//! This module turns a [`Seed`] into per-network key material and network-formatted
//! addresses. Every supported network is described by a single [`NetworkSpec`] value
//! (curve, BIP44 purpose and coin type, address encoding), so there is one derivation
//! routine parameterized by that description rather than one key-chain type per network.
//!
//! - `network`: network identifiers and their derivation/encoding parameters.
//! - `path`: structured BIP32 derivation paths.
//! - `seed`: seed material and BIP39 mnemonic handling.
//! - `derivation`: secp256k1 (BIP32) and ed25519 (SLIP-0010) child key derivation.
//! - `address`: public key to address encoding and address validation.

pub mod address;
pub mod derivation;
pub mod network;
pub mod path;
pub mod seed;

pub use address::{Address, address_from_public_key};
pub use derivation::{KeyPair, derive, derive_address_key};
pub use network::{AddressEncoding, Curve, Network, NetworkSpec};
pub use path::{ChildIndex, DerivationPath, HARDENED_OFFSET};
pub use seed::{Seed, generate_mnemonic};

/// Errors raised while deriving keys or encoding addresses.
///
/// These are fatal for the kit being constructed: without a valid seed and network
/// there is no address to sync.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
	#[error("Invalid seed: {0}")]
	InvalidSeed(String),

	#[error("Unsupported network: {0}")]
	UnsupportedNetwork(String),

	#[error("Invalid derivation path: {0}")]
	InvalidPath(String),

	#[error("Invalid mnemonic: {0}")]
	InvalidMnemonic(String),

	#[error("Key derivation failed: {0}")]
	Derivation(String),

	#[error("Address encoding error: {0}")]
	Encoding(String),
}
