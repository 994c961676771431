//! Deterministic key derivation.
//!
//! secp256k1 networks follow BIP32 (via `coins-bip32`); ed25519 networks follow
//! SLIP-0010, which only defines hardened derivation. Both are pure functions of
//! `(seed, network, path)`.

use crate::keys::network::{Curve, Network};
use crate::keys::path::{ChildIndex, DerivationPath};
use crate::keys::seed::Seed;
use crate::keys::{Address, KeyError};

use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::fmt;
use zeroize::Zeroizing;

type HmacSha512 = Hmac<Sha512>;

/// HMAC key of the SLIP-0010 ed25519 master node
const ED25519_SEED_KEY: &[u8] = b"ed25519 seed";

/// Key material derived for one path on one network.
///
/// The private half never leaves the crate; callers only see the public key and the
/// address built from it.
pub struct KeyPair {
	network: Network,
	path: DerivationPath,
	secret: Zeroizing<Vec<u8>>,
	public_key: Vec<u8>,
}

impl KeyPair {
	pub fn network(&self) -> Network {
		self.network
	}

	pub fn path(&self) -> &DerivationPath {
		&self.path
	}

	/// Compressed SEC1 key (33 bytes) on secp256k1, raw 32-byte key on ed25519.
	pub fn public_key(&self) -> &[u8] {
		&self.public_key
	}

	pub fn address(&self) -> Result<Address, KeyError> {
		Address::from_public_key(&self.public_key, self.network)
	}

	#[cfg(test)]
	pub(crate) fn secret_bytes(&self) -> &[u8] {
		&self.secret
	}
}

impl fmt::Debug for KeyPair {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("KeyPair")
			.field("network", &self.network)
			.field("path", &self.path.to_string())
			.field("public_key", &hex::encode(&self.public_key))
			.finish()
	}
}

/// Derives the account-level key pair for `network`.
///
/// Uses the network's canonical account path unless `account_path` overrides it.
pub fn derive(
	seed: &Seed,
	network: Network,
	account_path: Option<&DerivationPath>,
) -> Result<KeyPair, KeyError> {
	let spec = network.spec();
	let path = match account_path {
		Some(path) => path.clone(),
		None => spec.default_account_path(),
	};
	derive_at(seed, network, path)
}

/// Derives the key that backs a receive/change address.
///
/// Bitcoin-family networks derive `account/change/index` below the account path.
/// Ed25519 networks have a single address per account, so only `(0, 0)` is valid and
/// yields the account key itself.
pub fn derive_address_key(
	seed: &Seed,
	network: Network,
	account_path: Option<&DerivationPath>,
	change: u32,
	index: u32,
) -> Result<KeyPair, KeyError> {
	let spec = network.spec();
	let account = match account_path {
		Some(path) => path.clone(),
		None => spec.default_account_path(),
	};

	match spec.curve {
		Curve::Secp256k1 => {
			let path = account
				.child(ChildIndex::normal(change)?)
				.child(ChildIndex::normal(index)?);
			derive_at(seed, network, path)
		}
		Curve::Ed25519 => {
			if change != 0 || index != 0 {
				return Err(KeyError::InvalidPath(format!(
					"{} has one address per account; use a different account path",
					network
				)));
			}
			derive_at(seed, network, account)
		}
	}
}

fn derive_at(seed: &Seed, network: Network, path: DerivationPath) -> Result<KeyPair, KeyError> {
	let (secret, public_key) = match network.spec().curve {
		Curve::Secp256k1 => derive_secp256k1(seed.as_bytes(), &path)?,
		Curve::Ed25519 => derive_ed25519(seed.as_bytes(), &path)?,
	};

	Ok(KeyPair {
		network,
		path,
		secret,
		public_key,
	})
}

fn derive_secp256k1(
	seed: &[u8],
	path: &DerivationPath,
) -> Result<(Zeroizing<Vec<u8>>, Vec<u8>), KeyError> {
	use coins_bip32::prelude::*;
	use k256::ecdsa::SigningKey;

	let bip32_path = path
		.to_string()
		.parse::<coins_bip32::path::DerivationPath>()
		.map_err(|e| KeyError::InvalidPath(e.to_string()))?;

	let master_key =
		XPriv::root_from_seed(seed, None).map_err(|e| KeyError::Derivation(e.to_string()))?;
	let derived_key = master_key
		.derive_path(&bip32_path)
		.map_err(|e| KeyError::Derivation(e.to_string()))?;

	let signing_key: &SigningKey = derived_key.as_ref();
	let secret = Zeroizing::new(signing_key.to_bytes().to_vec());
	let public_key = signing_key
		.verifying_key()
		.to_encoded_point(true)
		.as_bytes()
		.to_vec();

	Ok((secret, public_key))
}

fn derive_ed25519(
	seed: &[u8],
	path: &DerivationPath,
) -> Result<(Zeroizing<Vec<u8>>, Vec<u8>), KeyError> {
	if !path.is_fully_hardened() {
		return Err(KeyError::InvalidPath(format!(
			"ed25519 derivation only supports hardened components, got {}",
			path
		)));
	}

	let (secret, _chain_code) = slip10_derive(seed, path)?;
	let signing_key = ed25519_dalek::SigningKey::from_bytes(&secret);
	let public_key = signing_key.verifying_key().to_bytes().to_vec();

	Ok((Zeroizing::new(secret.to_vec()), public_key))
}

/// Walks a fully hardened path from the SLIP-0010 ed25519 master node.
fn slip10_derive(seed: &[u8], path: &DerivationPath) -> Result<([u8; 32], [u8; 32]), KeyError> {
	let (mut key, mut chain_code) = split_hmac(ED25519_SEED_KEY, &[seed])?;

	for component in path.components() {
		let index = component.to_bits().to_be_bytes();
		let (child_key, child_chain) =
			split_hmac(&chain_code, &[&[0u8][..], &key[..], &index[..]])?;
		key = child_key;
		chain_code = child_chain;
	}

	Ok((key, chain_code))
}

fn split_hmac(key: &[u8], parts: &[&[u8]]) -> Result<([u8; 32], [u8; 32]), KeyError> {
	let mut mac =
		HmacSha512::new_from_slice(key).map_err(|e| KeyError::Derivation(e.to_string()))?;
	for part in parts {
		mac.update(part);
	}
	let output = mac.finalize().into_bytes();

	let mut left = [0u8; 32];
	let mut right = [0u8; 32];
	left.copy_from_slice(&output[..32]);
	right.copy_from_slice(&output[32..]);
	Ok((left, right))
}
