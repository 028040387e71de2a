//! Notification decoding and shared balance state

pub mod balance;
pub mod parser;

pub use balance::SharedBalance;
pub use parser::{parse_balance, ParseError};
