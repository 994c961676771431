//! Monero mnemonic checksum.
//!
//! A 25-word Monero seed ends with a checksum word: the CRC32 of the concatenated
//! 3-character prefixes of the first 24 words, modulo 24, selects which of those
//! words is repeated.

use crate::validation::ValidationError;

const SEED_WORDS: usize = 24;
const PREFIX_LEN: usize = 3;

/// Checksum word of a 24-word seed.
pub fn checksum_word<S: AsRef<str>>(words: &[S]) -> Result<String, ValidationError> {
	if words.len() != SEED_WORDS {
		return Err(ValidationError::WordCount {
			expected: SEED_WORDS,
			found: words.len(),
		});
	}

	let prefixes: String = words.iter().map(|w| prefix(w.as_ref())).collect();
	let index = crc32(prefixes.as_bytes()) as usize % SEED_WORDS;
	Ok(words[index].as_ref().to_string())
}

/// Validates the checksum word of a 25-word seed phrase.
pub fn validate_seed_phrase(phrase: &str) -> Result<(), ValidationError> {
	let words: Vec<String> = phrase.split_whitespace().map(str::to_lowercase).collect();
	if words.len() != SEED_WORDS + 1 {
		return Err(ValidationError::WordCount {
			expected: SEED_WORDS + 1,
			found: words.len(),
		});
	}

	let expected = checksum_word(&words[..SEED_WORDS])?;
	let found = &words[SEED_WORDS];
	if prefix(&expected) != prefix(found) {
		return Err(ValidationError::ChecksumMismatch {
			expected,
			found: found.clone(),
		});
	}
	Ok(())
}

fn prefix(word: &str) -> String {
	word.chars().take(PREFIX_LEN).collect()
}

/// CRC-32/ISO-HDLC (the zlib CRC)
fn crc32(data: &[u8]) -> u32 {
	let mut crc = 0xffff_ffffu32;
	for byte in data {
		crc ^= *byte as u32;
		for _ in 0..8 {
			crc = if crc & 1 != 0 {
				(crc >> 1) ^ 0xedb8_8320
			} else {
				crc >> 1
			};
		}
	}
	!crc
}

#[cfg(test)]
mod tests {
	use super::*;

	const SEED: &str = "sequence atlas unveil summon pebbles tuesday beer rudely snake rockets \
		different fuselage woven tagged bested dented vegan hover rapid fawns obvious muppet \
		randomly seasons";

	#[test]
	fn test_crc32_check_value() {
		assert_eq!(crc32(b"123456789"), 0xcbf4_3926);
	}

	#[test]
	fn test_checksum_word() {
		let words: Vec<&str> = SEED.split_whitespace().collect();
		assert_eq!(checksum_word(&words).unwrap(), "randomly");
	}

	#[test]
	fn test_validate_seed_phrase() {
		assert!(validate_seed_phrase(&format!("{} randomly", SEED)).is_ok());
		assert!(validate_seed_phrase(&format!("{} RANDOMLY", SEED)).is_ok());
		assert!(matches!(
			validate_seed_phrase(&format!("{} seasons", SEED)),
			Err(ValidationError::ChecksumMismatch { .. })
		));
		assert!(matches!(
			validate_seed_phrase(SEED),
			Err(ValidationError::WordCount {
				expected: 25,
				found: 24
			})
		));
	}
}
