use crate::keys::KeyError;
use crate::keys::path::{ChildIndex, DerivationPath};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Elliptic curve used for a network's keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Curve {
	/// BIP32 derivation on secp256k1 (Bitcoin family)
	Secp256k1,
	/// SLIP-0010 derivation on ed25519 (hardened components only)
	Ed25519,
}

/// How a public key is rendered as an address string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressEncoding {
	/// Base58Check of `version || HASH160(pubkey)` (P2PKH)
	Base58Check { version: u8 },
	/// Bech32 segwit v0 witness program of `HASH160(pubkey)` (P2WPKH)
	SegwitV0 { hrp: &'static str },
	/// Plain Base58 of the raw 32-byte public key
	Base58,
	/// Stellar StrKey account id (`G...`)
	StrKey,
}

/// Derivation and encoding parameters of one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSpec {
	pub name: &'static str,
	pub symbol: &'static str,
	pub curve: Curve,
	pub purpose: u32,
	pub coin_type: u32,
	/// Hardened components appended after the account index (Solana uses `0'`)
	pub account_suffix: &'static [ChildIndex],
	pub encoding: AddressEncoding,
	/// Number of decimals of the base unit (satoshi, lamport, stroop)
	pub decimals: u32,
	pub is_testnet: bool,
}

impl NetworkSpec {
	/// Account-level path `m/purpose'/coin_type'/account'[/suffix]`.
	pub fn account_path(&self, account: u32) -> Result<DerivationPath, KeyError> {
		let mut components = vec![
			ChildIndex::hardened(self.purpose)?,
			ChildIndex::hardened(self.coin_type)?,
			ChildIndex::hardened(account)?,
		];
		components.extend_from_slice(self.account_suffix);
		DerivationPath::new(components)
	}

	/// Canonical path for account 0.
	pub fn default_account_path(&self) -> DerivationPath {
		// purpose and coin type constants are all below the hardened offset
		DerivationPath::from_trusted(
			[
				ChildIndex::Hardened(self.purpose),
				ChildIndex::Hardened(self.coin_type),
				ChildIndex::Hardened(0),
			]
			.into_iter()
			.chain(self.account_suffix.iter().copied())
			.collect(),
		)
	}
}

static BITCOIN: NetworkSpec = NetworkSpec {
	name: "bitcoin",
	symbol: "BTC",
	curve: Curve::Secp256k1,
	purpose: 44,
	coin_type: 0,
	account_suffix: &[],
	encoding: AddressEncoding::Base58Check { version: 0x00 },
	decimals: 8,
	is_testnet: false,
};

static BITCOIN_TESTNET: NetworkSpec = NetworkSpec {
	name: "bitcoin-testnet",
	symbol: "tBTC",
	curve: Curve::Secp256k1,
	purpose: 44,
	coin_type: 1,
	account_suffix: &[],
	encoding: AddressEncoding::Base58Check { version: 0x6f },
	decimals: 8,
	is_testnet: true,
};

static BITCOIN_SEGWIT: NetworkSpec = NetworkSpec {
	name: "bitcoin-segwit",
	symbol: "BTC",
	curve: Curve::Secp256k1,
	purpose: 84,
	coin_type: 0,
	account_suffix: &[],
	encoding: AddressEncoding::SegwitV0 { hrp: "bc" },
	decimals: 8,
	is_testnet: false,
};

static BITCOIN_SEGWIT_TESTNET: NetworkSpec = NetworkSpec {
	name: "bitcoin-segwit-testnet",
	symbol: "tBTC",
	curve: Curve::Secp256k1,
	purpose: 84,
	coin_type: 1,
	account_suffix: &[],
	encoding: AddressEncoding::SegwitV0 { hrp: "tb" },
	decimals: 8,
	is_testnet: true,
};

static LITECOIN: NetworkSpec = NetworkSpec {
	name: "litecoin",
	symbol: "LTC",
	curve: Curve::Secp256k1,
	purpose: 44,
	coin_type: 2,
	account_suffix: &[],
	encoding: AddressEncoding::Base58Check { version: 0x30 },
	decimals: 8,
	is_testnet: false,
};

static DOGECOIN: NetworkSpec = NetworkSpec {
	name: "dogecoin",
	symbol: "DOGE",
	curve: Curve::Secp256k1,
	purpose: 44,
	coin_type: 3,
	account_suffix: &[],
	encoding: AddressEncoding::Base58Check { version: 0x1e },
	decimals: 8,
	is_testnet: false,
};

static SOLANA: NetworkSpec = NetworkSpec {
	name: "solana",
	symbol: "SOL",
	curve: Curve::Ed25519,
	purpose: 44,
	coin_type: 501,
	account_suffix: &[ChildIndex::Hardened(0)],
	encoding: AddressEncoding::Base58,
	decimals: 9,
	is_testnet: false,
};

static STELLAR: NetworkSpec = NetworkSpec {
	name: "stellar",
	symbol: "XLM",
	curve: Curve::Ed25519,
	purpose: 44,
	coin_type: 148,
	account_suffix: &[],
	encoding: AddressEncoding::StrKey,
	decimals: 7,
	is_testnet: false,
};

/// Networks with a known derivation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
	Bitcoin,
	BitcoinTestnet,
	BitcoinSegwit,
	BitcoinSegwitTestnet,
	Litecoin,
	Dogecoin,
	Solana,
	Stellar,
}

impl Network {
	pub const ALL: [Network; 8] = [
		Network::Bitcoin,
		Network::BitcoinTestnet,
		Network::BitcoinSegwit,
		Network::BitcoinSegwitTestnet,
		Network::Litecoin,
		Network::Dogecoin,
		Network::Solana,
		Network::Stellar,
	];

	pub fn spec(&self) -> &'static NetworkSpec {
		match self {
			Network::Bitcoin => &BITCOIN,
			Network::BitcoinTestnet => &BITCOIN_TESTNET,
			Network::BitcoinSegwit => &BITCOIN_SEGWIT,
			Network::BitcoinSegwitTestnet => &BITCOIN_SEGWIT_TESTNET,
			Network::Litecoin => &LITECOIN,
			Network::Dogecoin => &DOGECOIN,
			Network::Solana => &SOLANA,
			Network::Stellar => &STELLAR,
		}
	}

	pub fn name(&self) -> &'static str {
		self.spec().name
	}
}

impl fmt::Display for Network {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for Network {
	type Err = KeyError;

	/// Unknown identifiers fail with `UnsupportedNetwork` instead of yielding no key chain.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let wanted = s.trim().to_ascii_lowercase();
		Network::ALL
			.into_iter()
			.find(|network| network.name() == wanted)
			.ok_or_else(|| KeyError::UnsupportedNetwork(s.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_mainnet_and_testnet_coin_types() {
		assert_eq!(
			Network::Bitcoin.spec().default_account_path().to_string(),
			"m/44'/0'/0'"
		);
		assert_eq!(
			Network::BitcoinTestnet.spec().default_account_path().to_string(),
			"m/44'/1'/0'"
		);
		assert_eq!(
			Network::Solana.spec().default_account_path().to_string(),
			"m/44'/501'/0'/0'"
		);
		assert_eq!(
			Network::Stellar.spec().default_account_path().to_string(),
			"m/44'/148'/0'"
		);
	}

	#[test]
	fn test_account_path_uses_account_index() {
		let path = Network::Stellar.spec().account_path(3).unwrap();
		assert_eq!(path.to_string(), "m/44'/148'/3'");
	}

	#[test]
	fn test_parse_network() {
		assert_eq!("Solana".parse::<Network>().unwrap(), Network::Solana);
		assert_eq!(
			"bitcoin-testnet".parse::<Network>().unwrap(),
			Network::BitcoinTestnet
		);
		assert!(matches!(
			"eos".parse::<Network>(),
			Err(KeyError::UnsupportedNetwork(_))
		));
	}
}
