use crate::keys::KeyError;

use std::fmt;
use std::str::FromStr;

/// Offset added to an index to mark it hardened.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// One component of a derivation path.
///
/// The wrapped index is the logical index (`0` for `0'`); the hardened offset is only
/// applied when the component is turned into the 32-bit child number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildIndex {
	Normal(u32),
	Hardened(u32),
}

impl ChildIndex {
	pub fn normal(index: u32) -> Result<Self, KeyError> {
		Self::check(index)?;
		Ok(ChildIndex::Normal(index))
	}

	pub fn hardened(index: u32) -> Result<Self, KeyError> {
		Self::check(index)?;
		Ok(ChildIndex::Hardened(index))
	}

	fn check(index: u32) -> Result<(), KeyError> {
		if index >= HARDENED_OFFSET {
			return Err(KeyError::InvalidPath(format!(
				"index {} is out of range (must be below 2^31)",
				index
			)));
		}
		Ok(())
	}

	pub fn is_hardened(&self) -> bool {
		matches!(self, ChildIndex::Hardened(_))
	}

	pub fn index(&self) -> u32 {
		match self {
			ChildIndex::Normal(i) | ChildIndex::Hardened(i) => *i,
		}
	}

	/// The 32-bit child number used by BIP32/SLIP-0010.
	pub fn to_bits(&self) -> u32 {
		match self {
			ChildIndex::Normal(i) => *i,
			ChildIndex::Hardened(i) => *i | HARDENED_OFFSET,
		}
	}
}

impl fmt::Display for ChildIndex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ChildIndex::Normal(i) => write!(f, "{}", i),
			ChildIndex::Hardened(i) => write!(f, "{}'", i),
		}
	}
}

/// A BIP32 derivation path such as `m/44'/0'/0'`.
///
/// Paths compare structurally: `m/44h/0h` and `m/44'/0'` are the same path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DerivationPath(Vec<ChildIndex>);

impl DerivationPath {
	pub fn new(components: Vec<ChildIndex>) -> Result<Self, KeyError> {
		for component in &components {
			ChildIndex::check(component.index())?;
		}
		Ok(Self(components))
	}

	/// Builds a path from components already known to be in range.
	pub(crate) fn from_trusted(components: Vec<ChildIndex>) -> Self {
		Self(components)
	}

	pub fn components(&self) -> &[ChildIndex] {
		&self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn is_fully_hardened(&self) -> bool {
		self.0.iter().all(ChildIndex::is_hardened)
	}

	/// Returns a new path with `child` appended.
	pub fn child(&self, child: ChildIndex) -> Self {
		let mut components = self.0.clone();
		components.push(child);
		Self(components)
	}
}

impl fmt::Display for DerivationPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("m")?;
		for component in &self.0 {
			write!(f, "/{}", component)?;
		}
		Ok(())
	}
}

impl FromStr for DerivationPath {
	type Err = KeyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut parts = s.trim().split('/');
		match parts.next() {
			Some("m") | Some("M") => {}
			_ => {
				return Err(KeyError::InvalidPath(format!(
					"path '{}' must start with 'm'",
					s
				)));
			}
		}

		let mut components = Vec::new();
		for part in parts {
			let (digits, hardened) = match part.strip_suffix(['\'', 'h', 'H']) {
				Some(digits) => (digits, true),
				None => (part, false),
			};
			let index: u32 = digits.parse().map_err(|_| {
				KeyError::InvalidPath(format!("invalid component '{}' in '{}'", part, s))
			})?;
			components.push(if hardened {
				ChildIndex::hardened(index)?
			} else {
				ChildIndex::normal(index)?
			});
		}

		Ok(Self(components))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_and_display() {
		let path: DerivationPath = "m/44'/0'/0'/0/5".parse().unwrap();
		assert_eq!(path.len(), 5);
		assert_eq!(path.components()[0], ChildIndex::Hardened(44));
		assert_eq!(path.components()[4], ChildIndex::Normal(5));
		assert_eq!(path.to_string(), "m/44'/0'/0'/0/5");
	}

	#[test]
	fn test_structural_equality() {
		let a: DerivationPath = "m/44h/1H/0'".parse().unwrap();
		let b: DerivationPath = "m/44'/1'/0'".parse().unwrap();
		assert_eq!(a, b);
		assert_ne!(a, "m/44'/1'/0".parse::<DerivationPath>().unwrap());
	}

	#[test]
	fn test_hardened_bits() {
		assert_eq!(ChildIndex::Hardened(44).to_bits(), 0x8000_002c);
		assert_eq!(ChildIndex::Normal(7).to_bits(), 7);
	}

	#[test]
	fn test_rejects_out_of_range_and_garbage() {
		assert!("m/2147483648".parse::<DerivationPath>().is_err());
		assert!("44'/0'".parse::<DerivationPath>().is_err());
		assert!("m/abc".parse::<DerivationPath>().is_err());
		assert!(ChildIndex::hardened(HARDENED_OFFSET).is_err());
	}

	#[test]
	fn test_root_path() {
		let root: DerivationPath = "m".parse().unwrap();
		assert!(root.is_empty());
		assert_eq!(root.to_string(), "m");
	}
}
