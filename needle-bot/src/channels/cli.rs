//! Terminal channel.
//!
//! Prompts are printed with their buttons listed underneath. A line starting
//! with `!` presses the button with that token, `photo:<ref>` sends a photo,
//! anything else is sent as text.

use crate::bus::MessageBus;
use crate::channel::{Channel, ChannelBase, ChannelState, ChannelStatus};
use crate::error::{ChannelError, ChannelResult};
use crate::events::{InboundMessage, OutboundMessage};
use async_trait::async_trait;
use needle::OwnerId;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};

/// Channel name used for routing.
pub const CLI_CHANNEL: &str = "cli";

/// Chat id of the single terminal conversation.
const CLI_CHAT: &str = "direct";

/// CLI channel configuration.
#[derive(Debug, Clone)]
pub struct CliChannelConfig {
    /// Prompt string to display before user input.
    pub prompt: String,
    /// Owner id the terminal user acts as.
    pub owner: OwnerId,
}

impl Default for CliChannelConfig {
    fn default() -> Self {
        Self {
            prompt: "> ".to_string(),
            owner: 1,
        }
    }
}

impl CliChannelConfig {
    /// Create a new CLI channel config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prompt string.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the owner id.
    #[must_use]
    pub const fn owner(mut self, owner: OwnerId) -> Self {
        self.owner = owner;
        self
    }
}

/// Turn one line of terminal input into an inbound message.
///
/// Returns `None` for blank lines.
#[must_use]
pub fn parse_line(line: &str, owner: OwnerId) -> Option<InboundMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(token) = trimmed.strip_prefix('!')
        && !token.is_empty()
    {
        return Some(InboundMessage::button(CLI_CHANNEL, owner, CLI_CHAT, token));
    }
    if let Some(reference) = trimmed.strip_prefix("photo:")
        && !reference.trim().is_empty()
    {
        return Some(InboundMessage::photo(
            CLI_CHANNEL,
            owner,
            CLI_CHAT,
            reference.trim(),
        ));
    }
    Some(InboundMessage::text(CLI_CHANNEL, owner, CLI_CHAT, trimmed))
}

/// Render an outbound message for the terminal.
#[must_use]
pub fn render(msg: &OutboundMessage) -> String {
    let mut out = msg.content.replace("**", "");
    for row in msg.keyboard.iter().filter(|row| !row.is_empty()) {
        out.push('\n');
        let buttons: Vec<String> = row
            .iter()
            .map(|b| format!("[{}] !{}", b.label, b.token))
            .collect();
        out.push_str(&buttons.join("   "));
    }
    out
}

/// Terminal output channel. Input is read by [`run_interactive`].
#[derive(Debug)]
pub struct CliChannel {
    base: ChannelBase,
    config: CliChannelConfig,
    shutdown_tx: RwLock<Option<mpsc::Sender<()>>>,
}

impl CliChannel {
    /// Create a new CLI channel with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CliChannelConfig::default())
    }

    /// Create a new CLI channel with the given configuration.
    #[must_use]
    pub fn with_config(config: CliChannelConfig) -> Self {
        Self {
            base: ChannelBase::new(CLI_CHANNEL),
            config,
            shutdown_tx: RwLock::new(None),
        }
    }

    #[allow(clippy::print_stdout)]
    fn print_message(msg: &OutboundMessage, prompt: &str) {
        println!("\n{}\n", render(msg));
        print!("{prompt}");
        let _ = std::io::stdout().flush();
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, bus: &MessageBus) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Starting).await;

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        *self.shutdown_tx.write().await = Some(shutdown_tx);

        let mut outbound_rx = bus.subscribe_channel(CLI_CHANNEL).await;
        let prompt = self.config.prompt.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(msg) = outbound_rx.recv() => Self::print_message(&msg, &prompt),
                    _ = shutdown_rx.recv() => {
                        debug!("CLI output handler shutting down");
                        break;
                    }
                }
            }
        });

        self.base.set_state(ChannelState::Running).await;
        info!("CLI channel started");
        Ok(())
    }

    async fn stop(&self) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Stopping).await;

        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(()).await;
        }

        self.base.set_state(ChannelState::Stopped).await;
        info!("CLI channel stopped");
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> ChannelResult<()> {
        Self::print_message(msg, &self.config.prompt);
        self.base.record_sent().await;
        Ok(())
    }

    async fn status(&self) -> ChannelStatus {
        self.base.build_status().await
    }
}

/// Read terminal input and publish it until `exit`, `quit` or end of input.
///
/// Replies are printed by a running [`CliChannel`].
///
/// # Errors
///
/// Fails if stdin cannot be read or the bus is closed.
#[allow(clippy::print_stdout)]
pub async fn run_interactive(bus: &MessageBus, config: &CliChannelConfig) -> ChannelResult<()> {
    print!("{}", config.prompt);
    let _ = std::io::stdout().flush();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| ChannelError::internal(e.to_string()))?
    {
        let trimmed = line.trim();
        if matches!(trimmed, "exit" | "quit" | "/quit") {
            break;
        }

        match parse_line(trimmed, config.owner) {
            Some(msg) => bus.publish_inbound(msg).await?,
            None => {
                print!("{}", config.prompt);
                let _ = std::io::stdout().flush();
            }
        }
    }

    info!("interactive session ended");
    Ok(())
}
