//! Needle Bot - chat front end for the needle dialog engine.
//!
//! Connects chat channels (Telegram, terminal) to a [`needle::engine::DialogEngine`]
//! and keeps the committed records in JSON files.
//!
//! # Architecture
//!
//! - **Message Bus** ([`bus`]) - Async queues between channels and the gateway
//! - **Channels** ([`channels`]) - Platform integrations (CLI, Telegram)
//! - **Gateway** ([`gateway`]) - Per-owner workers feeding the dialog engine
//! - **Menu** ([`menu`]) - Commands and menu buttons outside a dialog
//! - **Storage** ([`storage`]) - JSON-file record store
//! - **Goals** ([`goals`]) - Plan completion notices
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use needle_bot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = load_config().await?;
//!     let gateway = GatewayBuilder::new().bot_config(config).build()?;
//!     gateway.run().await
//! }
//! ```
//!
//! # Features
//!
//! - `telegram` - Enable Telegram bot support via teloxide (default)

pub mod bus;
pub mod channel;
pub mod channels;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod goals;
pub mod menu;
pub mod storage;
pub mod transport;
pub mod util;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{
        BotError, BusError, BusResult, ChannelError, ChannelResult, ConfigError, ConfigResult,
        ErrorContext, Result, StorageError, StorageResult,
    };

    pub use crate::bus::{InboundHandle, MessageBus, MessageBusBuilder};

    pub use crate::channel::{
        Channel, ChannelBase, ChannelManager, ChannelState, ChannelStatus, OwnerAllowlist,
    };
    pub use crate::channels::CliChannel;
    pub use crate::channels::cli::{CliChannelConfig, run_interactive};
    #[cfg(feature = "telegram")]
    pub use crate::channels::{TelegramChannel, telegram::TelegramChannelConfig};

    pub use crate::config::{
        BotConfig, CliConfig, ConfigIssue, DialogConfig, IssueLevel, StorageConfig,
        TelegramConfig, config_path, init_config, load_config, load_config_from, load_validated,
        save_config,
    };

    pub use crate::events::{InboundMessage, MessageFormat, OutboundMessage};

    pub use crate::gateway::{
        EventProcessor, Gateway, GatewayBuilder, GatewayConfig, GatewayStatus, Handled,
    };

    pub use crate::goals::PlanProgressHook;
    pub use crate::menu::{MainMenu, MenuAction};
    pub use crate::storage::JsonFileRecordStore;
    pub use crate::transport::BusTransport;

    pub use crate::util::{config_dir, data_dir, home_dir, split_into_chunks};
}
