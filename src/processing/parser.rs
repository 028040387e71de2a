//! Decoding of balance notifications from the weight sensor
//!
//! The sensor sends one of three ASCII tokens per notification. Anything
//! else is rejected so that the caller can drop it without touching state.

use crate::core::BalanceState;
use thiserror::Error;

/// Errors that can occur while decoding a notification payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("payload is not valid UTF-8")]
    InvalidEncoding,
    #[error("empty payload")]
    Empty,
    #[error("unknown balance token {token:?}")]
    UnknownToken { token: String },
}

/// Decode a notification into a balance reading.
///
/// Surrounding whitespace is ignored; the token itself is case-sensitive.
pub fn parse_balance(payload: &[u8]) -> Result<BalanceState, ParseError> {
    let text = std::str::from_utf8(payload).map_err(|_| ParseError::InvalidEncoding)?;
    match text.trim() {
        "" => Err(ParseError::Empty),
        "LEFT" => Ok(BalanceState::Left),
        "RIGHT" => Ok(BalanceState::Right),
        "BALANCED" => Ok(BalanceState::Balanced),
        other => Err(ParseError::UnknownToken {
            token: other.to_string(),
        }),
    }
}
