use crate::keys::KeyError;

use bip39::Mnemonic;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Shortest and longest seeds accepted by BIP32/SLIP-0010.
const MIN_SEED_LEN: usize = 16;
const MAX_SEED_LEN: usize = 64;

/// Seed material a kit derives its keys from.
///
/// The bytes are wiped when the seed is dropped. `Debug` never prints them.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Seed {
	bytes: Vec<u8>,
	#[zeroize(skip)]
	created_at: DateTime<Utc>,
}

impl Seed {
	/// Wraps raw seed bytes. Length implies strength and must be 16..=64 bytes.
	pub fn from_bytes(bytes: Vec<u8>, created_at: DateTime<Utc>) -> Result<Self, KeyError> {
		if bytes.is_empty() {
			return Err(KeyError::InvalidSeed("seed is empty".to_string()));
		}
		if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&bytes.len()) {
			return Err(KeyError::InvalidSeed(format!(
				"seed length {} is outside {}..={} bytes",
				bytes.len(),
				MIN_SEED_LEN,
				MAX_SEED_LEN
			)));
		}
		Ok(Self { bytes, created_at })
	}

	/// BIP39 seed of a mnemonic phrase and optional passphrase.
	pub fn from_mnemonic(phrase: &str, passphrase: &str) -> Result<Self, KeyError> {
		let mnemonic = Mnemonic::parse_normalized(phrase)
			.map_err(|e| KeyError::InvalidMnemonic(e.to_string()))?;
		let seed = mnemonic.to_seed(passphrase);
		Self::from_bytes(seed.to_vec(), Utc::now())
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}

	pub fn created_at(&self) -> DateTime<Utc> {
		self.created_at
	}
}

impl fmt::Debug for Seed {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Seed")
			.field("len", &self.bytes.len())
			.field("created_at", &self.created_at)
			.finish()
	}
}

/// Generates a fresh English mnemonic with 12, 15, 18, 21 or 24 words.
pub fn generate_mnemonic(word_count: usize) -> Result<String, KeyError> {
	match word_count {
		12 | 15 | 18 | 21 | 24 => {}
		_ => {
			return Err(KeyError::InvalidMnemonic(format!(
				"invalid word count {}, must be 12, 15, 18, 21 or 24",
				word_count
			)));
		}
	}

	// 32 bits of entropy per 3 words
	let mut entropy = vec![0u8; word_count / 3 * 4];
	rand::rng().fill(&mut entropy[..]);

	let mnemonic =
		Mnemonic::from_entropy(&entropy).map_err(|e| KeyError::InvalidMnemonic(e.to_string()));
	entropy.zeroize();

	Ok(mnemonic?.to_string())
}
