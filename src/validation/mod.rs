//! Input validators for networks the sync engine does not derive keys for.
//!
//! Both are pure functions returning `Result`, so callers (import screens, address
//! books) decide how to surface the failure.

pub mod eos;
pub mod monero;

pub use eos::validate_account_name;
pub use monero::{checksum_word, validate_seed_phrase};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
	#[error("Expected {expected} words, found {found}")]
	WordCount { expected: usize, found: usize },

	#[error("Checksum word mismatch: expected '{expected}', found '{found}'")]
	ChecksumMismatch { expected: String, found: String },

	#[error("Account name is empty")]
	EmptyAccountName,

	#[error("Account name is {0} characters long, the maximum is 12")]
	AccountNameTooLong(usize),

	#[error("Invalid character '{0}' in account name")]
	InvalidCharacter(char),

	#[error("Account name must not end with '.'")]
	TrailingDot,
}
