//! Channel implementations.
//!
//! - [`cli::CliChannel`] - terminal channel (always available)
//! - [`telegram::TelegramChannel`] - Telegram bot (requires the `telegram` feature)

pub mod cli;

#[cfg(feature = "telegram")]
pub mod telegram;

pub use cli::CliChannel;

#[cfg(feature = "telegram")]
pub use telegram::TelegramChannel;
