//!
//! Utility module for the wallet sync engine.
//!
//! Re-exports amount formatting and parsing helpers used by providers and the demo binary.
/// Fixed-point amount helpers
pub mod index;

pub use index::{format_token_amount, parse_decimal_amount};
