use crate::keys::KeyError;
use crate::keys::network::{AddressEncoding, Network};

use bech32::{Fe32, Hrp};
use bitcoin::hashes::{Hash as _, hash160};
use serde::{Deserialize, Serialize};
use std::fmt;

/// StrKey version byte of an ed25519 account id (`G...`)
const STRKEY_ACCOUNT_ID: u8 = 6 << 3;
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Network-formatted public identity of a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
	/// Encodes a public key with the network's address rules.
	pub fn from_public_key(public_key: &[u8], network: Network) -> Result<Self, KeyError> {
		let encoded = match network.spec().encoding {
			AddressEncoding::Base58Check { version } => {
				let mut payload = Vec::with_capacity(21);
				payload.push(version);
				payload.extend_from_slice(&hash160_of(compressed_key(public_key)?));
				bs58::encode(payload).with_check().into_string()
			}
			AddressEncoding::SegwitV0 { hrp } => {
				let hrp = Hrp::parse(hrp).map_err(|e| KeyError::Encoding(e.to_string()))?;
				let program = hash160_of(compressed_key(public_key)?);
				bech32::segwit::encode_v0(hrp, &program)
					.map_err(|e| KeyError::Encoding(e.to_string()))?
			}
			AddressEncoding::Base58 => bs58::encode(ed25519_key(public_key)?).into_string(),
			AddressEncoding::StrKey => encode_strkey(STRKEY_ACCOUNT_ID, ed25519_key(public_key)?),
		};
		Ok(Self(encoded))
	}

	/// Validates an address string received from outside and normalizes it.
	pub fn parse(address: &str, network: Network) -> Result<Self, KeyError> {
		let address = address.trim();
		let invalid = |reason: &str| {
			KeyError::Encoding(format!("'{}' is not a {} address: {}", address, network, reason))
		};

		match network.spec().encoding {
			AddressEncoding::Base58Check { version } => {
				let decoded = bs58::decode(address)
					.with_check(Some(version))
					.into_vec()
					.map_err(|e| invalid(&e.to_string()))?;
				if decoded.len() != 21 {
					return Err(invalid("wrong payload length"));
				}
				Ok(Self(address.to_string()))
			}
			AddressEncoding::SegwitV0 { hrp } => {
				let normalized = address.to_ascii_lowercase();
				let expected = Hrp::parse(hrp).map_err(|e| KeyError::Encoding(e.to_string()))?;
				let (found, version, program) =
					bech32::segwit::decode(&normalized).map_err(|e| invalid(&e.to_string()))?;
				if found != expected {
					return Err(invalid("wrong human-readable part"));
				}
				if version != Fe32::Q || program.len() != 20 {
					return Err(invalid("not a P2WPKH program"));
				}
				Ok(Self(normalized))
			}
			AddressEncoding::Base58 => {
				let decoded = bs58::decode(address)
					.into_vec()
					.map_err(|e| invalid(&e.to_string()))?;
				if decoded.len() != 32 {
					return Err(invalid("expected a 32-byte public key"));
				}
				Ok(Self(address.to_string()))
			}
			AddressEncoding::StrKey => {
				decode_strkey(STRKEY_ACCOUNT_ID, address).map_err(|reason| invalid(&reason))?;
				Ok(Self(address.to_string()))
			}
		}
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for Address {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

/// Same `(pubkey, network)` always yields the same address.
pub fn address_from_public_key(public_key: &[u8], network: Network) -> Result<Address, KeyError> {
	Address::from_public_key(public_key, network)
}

fn compressed_key(public_key: &[u8]) -> Result<&[u8], KeyError> {
	match public_key {
		[0x02 | 0x03, ..] if public_key.len() == 33 => Ok(public_key),
		_ => Err(KeyError::Encoding(format!(
			"expected a 33-byte compressed secp256k1 key, got {} bytes",
			public_key.len()
		))),
	}
}

fn ed25519_key(public_key: &[u8]) -> Result<&[u8], KeyError> {
	if public_key.len() != 32 {
		return Err(KeyError::Encoding(format!(
			"expected a 32-byte ed25519 key, got {} bytes",
			public_key.len()
		)));
	}
	Ok(public_key)
}

fn hash160_of(data: &[u8]) -> [u8; 20] {
	hash160::Hash::hash(data).to_byte_array()
}

fn encode_strkey(version: u8, payload: &[u8]) -> String {
	let mut data = Vec::with_capacity(payload.len() + 3);
	data.push(version);
	data.extend_from_slice(payload);
	let checksum = crc16_xmodem(&data);
	data.extend_from_slice(&checksum.to_le_bytes());
	base32_encode(&data)
}

fn decode_strkey(version: u8, encoded: &str) -> Result<Vec<u8>, String> {
	let data = base32_decode(encoded).ok_or_else(|| "invalid base32".to_string())?;
	if data.len() != 35 {
		return Err(format!("decoded length {} != 35", data.len()));
	}
	if data[0] != version {
		return Err("wrong version byte".to_string());
	}
	let (body, checksum) = data.split_at(33);
	if crc16_xmodem(body).to_le_bytes() != checksum {
		return Err("checksum mismatch".to_string());
	}
	Ok(body[1..].to_vec())
}

/// CRC-16/XMODEM (poly 0x1021, init 0), as used by StrKey.
fn crc16_xmodem(data: &[u8]) -> u16 {
	let mut crc: u16 = 0;
	for byte in data {
		crc ^= (*byte as u16) << 8;
		for _ in 0..8 {
			crc = if crc & 0x8000 != 0 {
				(crc << 1) ^ 0x1021
			} else {
				crc << 1
			};
		}
	}
	crc
}

/// RFC 4648 base32 without padding.
fn base32_encode(data: &[u8]) -> String {
	let mut out = String::with_capacity(data.len().div_ceil(5) * 8);
	let mut buffer: u32 = 0;
	let mut bits = 0;
	for byte in data {
		buffer = (buffer << 8) | *byte as u32;
		bits += 8;
		while bits >= 5 {
			bits -= 5;
			out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
		}
	}
	if bits > 0 {
		out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
	}
	out
}

fn base32_decode(encoded: &str) -> Option<Vec<u8>> {
	let mut out = Vec::with_capacity(encoded.len() * 5 / 8);
	let mut buffer: u32 = 0;
	let mut bits = 0;
	for c in encoded.trim_end_matches('=').bytes() {
		let value = BASE32_ALPHABET.iter().position(|a| *a == c)? as u32;
		buffer = (buffer << 5) | value;
		bits += 5;
		if bits >= 8 {
			bits -= 8;
			out.push((buffer >> bits) as u8);
		}
	}
	Some(out)
}
