//! Telegram channel using teloxide.
//!
//! Text messages, photos and inline button presses become inbound messages.
//! Outbound prompts are rendered as HTML with their buttons attached as an
//! inline keyboard.
//!
//! # Example
//!
//! ```rust,ignore
//! use needle_bot::channels::{TelegramChannel, telegram::TelegramChannelConfig};
//! use needle_bot::bus::MessageBus;
//!
//! let config = TelegramChannelConfig::new("YOUR_BOT_TOKEN").allow_user(123456789);
//! let telegram = TelegramChannel::new(config);
//! telegram.start(&MessageBus::new()).await?;
//! ```

use crate::bus::{InboundHandle, MessageBus};
use crate::channel::{Channel, ChannelBase, ChannelState, ChannelStatus, OwnerAllowlist};
use crate::error::{ChannelError, ChannelResult};
use crate::events::{InboundMessage, MessageFormat, OutboundMessage};
use crate::util::split_into_chunks;
use async_trait::async_trait;
use needle::transport::Keyboard;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};

/// Channel name used for routing.
pub const TELEGRAM_CHANNEL: &str = "telegram";

/// Telegram's message length limit.
const MAX_MESSAGE_LENGTH: usize = 4096;

/// Telegram channel configuration.
#[derive(Debug, Clone)]
pub struct TelegramChannelConfig {
    /// Bot token from @BotFather.
    pub token: String,
    /// Users the bot answers.
    pub allowlist: OwnerAllowlist,
    /// Maximum message length before splitting.
    pub max_message_length: usize,
}

impl TelegramChannelConfig {
    /// Create a new Telegram channel config with the given token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            allowlist: OwnerAllowlist::default(),
            max_message_length: MAX_MESSAGE_LENGTH,
        }
    }

    /// Try to create config from the `TELEGRAM_BOT_TOKEN` environment variable.
    #[must_use]
    pub fn try_from_env() -> Option<Self> {
        std::env::var("TELEGRAM_BOT_TOKEN").ok().map(Self::new)
    }

    /// Add an allowed user ID.
    #[must_use]
    pub fn allow_user(mut self, user_id: i64) -> Self {
        self.allowlist = self.allowlist.allow(user_id);
        self
    }

    /// Add multiple allowed user IDs.
    #[must_use]
    pub fn allow_users(mut self, user_ids: impl IntoIterator<Item = i64>) -> Self {
        for id in user_ids {
            self.allowlist = self.allowlist.allow(id);
        }
        self
    }
}

/// Telegram channel implementation.
pub struct TelegramChannel {
    base: Arc<ChannelBase>,
    config: TelegramChannelConfig,
    bot: RwLock<Option<Bot>>,
    shutdown_tx: RwLock<Option<mpsc::Sender<()>>>,
}

impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("base", &self.base)
            .field("allowlist", &self.config.allowlist)
            .finish_non_exhaustive()
    }
}

impl TelegramChannel {
    /// Create a new Telegram channel with the given configuration.
    #[must_use]
    pub fn new(config: TelegramChannelConfig) -> Self {
        Self {
            base: Arc::new(ChannelBase::new(TELEGRAM_CHANNEL)),
            config,
            bot: RwLock::new(None),
            shutdown_tx: RwLock::new(None),
        }
    }
}

/// Convert the Markdown subset used in prompts to Telegram-safe HTML.
#[must_use]
pub fn markdown_to_telegram_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let patterns = MarkdownPatterns::get();

    let mut result = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");

    result = patterns
        .code_inline
        .replace_all(&result, "<code>$1</code>")
        .into_owned();
    result = patterns
        .bold
        .replace_all(&result, "<b>$1</b>")
        .into_owned();
    result = patterns
        .strikethrough
        .replace_all(&result, "<s>$1</s>")
        .into_owned();
    result = patterns
        .link
        .replace_all(&result, r#"<a href="$2">$1</a>"#)
        .into_owned();

    result
}

/// Inline keyboard for a prompt's button rows.
#[must_use]
pub fn keyboard_markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        keyboard
            .iter()
            .filter(|row| !row.is_empty())
            .map(|row| {
                row.iter()
                    .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.token.clone()))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>(),
    )
}

struct MarkdownPatterns {
    bold: Regex,
    code_inline: Regex,
    strikethrough: Regex,
    link: Regex,
}

impl MarkdownPatterns {
    fn new() -> Self {
        Self {
            bold: Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"),
            code_inline: Regex::new(r"`([^`]+)`").expect("valid regex"),
            strikethrough: Regex::new(r"~~(.+?)~~").expect("valid regex"),
            link: Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid regex"),
        }
    }

    fn get() -> &'static Self {
        static PATTERNS: OnceLock<MarkdownPatterns> = OnceLock::new();
        PATTERNS.get_or_init(Self::new)
    }
}

/// Send one outbound message, splitting long text. Buttons go on the last chunk.
async fn deliver(bot: &Bot, msg: &OutboundMessage, max_len: usize) -> ChannelResult<()> {
    let chat_id: i64 = msg
        .chat_id
        .parse()
        .map_err(|_| ChannelError::send(format!("invalid chat ID {}", msg.chat_id)))?;

    let (content, html) = match msg.format {
        MessageFormat::Markdown => (markdown_to_telegram_html(&msg.content), true),
        MessageFormat::Html => (msg.content.clone(), true),
        MessageFormat::Plain => (msg.content.clone(), false),
    };

    let chunks = split_into_chunks(&content, max_len);
    let last = chunks.len().saturating_sub(1);
    for (i, chunk) in chunks.into_iter().enumerate() {
        let mut request = bot.send_message(ChatId(chat_id), chunk);
        if html {
            request = request.parse_mode(ParseMode::Html);
        }
        if i == last && msg.has_keyboard() {
            request = request.reply_markup(keyboard_markup(&msg.keyboard));
        }
        request
            .await
            .map_err(|e| ChannelError::send(e.to_string()))?;
    }
    Ok(())
}

async fn forward(bus: &InboundHandle, base: &ChannelBase, inbound: InboundMessage) {
    base.record_received().await;
    if let Err(e) = bus.publish(inbound).await {
        error!(error = %e, "failed to publish telegram message to bus");
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, bus: &MessageBus) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Starting).await;
        if self.config.token.trim().is_empty() {
            self.base.set_state(ChannelState::Error).await;
            return Err(ChannelError::start("telegram token is empty"));
        }

        let bot = Bot::new(&self.config.token);
        *self.bot.write().await = Some(bot.clone());

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        *self.shutdown_tx.write().await = Some(shutdown_tx);

        let mut outbound_rx = bus.subscribe_channel(TELEGRAM_CHANNEL).await;
        let bot_for_output = bot.clone();
        let base_for_output = Arc::clone(&self.base);
        let max_len = self.config.max_message_length;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(msg) = outbound_rx.recv() => {
                        match deliver(&bot_for_output, &msg, max_len).await {
                            Ok(()) => base_for_output.record_sent().await,
                            Err(e) => base_for_output.record_error(e.to_string()).await,
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Telegram output handler shutting down");
                        break;
                    }
                }
            }
        });

        let bus_handle = bus.inbound_handle();
        let allowlist = self.config.allowlist.clone();
        let base = Arc::clone(&self.base);
        let message_handler = Update::filter_message().endpoint(move |msg: Message| {
            let bus_handle = bus_handle.clone();
            let allowlist = allowlist.clone();
            let base = Arc::clone(&base);

            async move {
                #[allow(clippy::cast_possible_wrap)]
                let user_id = msg.from.as_ref().map_or(0, |u| u.id.0 as i64);
                if !allowlist.is_allowed(user_id) {
                    debug!(user_id, "message from unauthorized user");
                    return Ok::<(), teloxide::RequestError>(());
                }
                let chat_id = msg.chat.id.0.to_string();

                let inbound = if let Some(text) = msg.text() {
                    InboundMessage::text(TELEGRAM_CHANNEL, user_id, chat_id, text)
                } else if let Some(sizes) = msg.photo()
                    && let Some(largest) = sizes.last()
                {
                    InboundMessage::photo(TELEGRAM_CHANNEL, user_id, chat_id, largest.file.id.to_string())
                } else {
                    debug!(user_id, "ignoring unsupported message kind");
                    return Ok(());
                };

                forward(&bus_handle, &base, inbound).await;
                Ok(())
            }
        });

        let bus_handle = bus.inbound_handle();
        let allowlist = self.config.allowlist.clone();
        let base = Arc::clone(&self.base);
        let callback_handler =
            Update::filter_callback_query().endpoint(move |bot: Bot, query: CallbackQuery| {
                let bus_handle = bus_handle.clone();
                let allowlist = allowlist.clone();
                let base = Arc::clone(&base);

                async move {
                    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
                        warn!(error = %e, "failed to answer callback query");
                    }

                    #[allow(clippy::cast_possible_wrap)]
                    let user_id = query.from.id.0 as i64;
                    let Some(token) = query.data else {
                        return Ok::<(), teloxide::RequestError>(());
                    };
                    if !allowlist.is_allowed(user_id) {
                        debug!(user_id, "button press from unauthorized user");
                        return Ok(());
                    }
                    let chat_id = query
                        .message
                        .as_ref()
                        .map_or(user_id, |m| m.chat().id.0)
                        .to_string();

                    let inbound = InboundMessage::button(TELEGRAM_CHANNEL, user_id, chat_id, token);
                    forward(&bus_handle, &base, inbound).await;
                    Ok(())
                }
            });

        let handler = dptree::entry()
            .branch(message_handler)
            .branch(callback_handler);

        let mut dispatcher = Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build();

        tokio::spawn(async move {
            dispatcher.dispatch().await;
        });

        self.base.set_state(ChannelState::Running).await;
        info!("Telegram channel started");
        Ok(())
    }

    async fn stop(&self) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Stopping).await;

        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(()).await;
        }
        *self.bot.write().await = None;

        self.base.set_state(ChannelState::Stopped).await;
        info!("Telegram channel stopped");
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> ChannelResult<()> {
        let bot = self.bot.read().await;
        let bot = bot.as_ref().ok_or(ChannelError::NotConnected)?;
        deliver(bot, msg, self.config.max_message_length).await?;
        self.base.record_sent().await;
        Ok(())
    }

    async fn status(&self) -> ChannelStatus {
        self.base.build_status().await
    }
}
