//! Message events exchanged between channels and the gateway.
//!
//! Channels turn whatever their platform delivers into [`InboundMessage`]s;
//! the gateway answers with [`OutboundMessage`]s carrying an optional inline
//! keyboard.

use needle::OwnerId;
use needle::input::{EventPayload, InboundEvent};
use needle::transport::Keyboard;
use needle::util::generate_id;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// A message received by a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Unique message ID.
    pub id: String,
    /// Channel identifier ("telegram", "cli").
    pub channel: String,
    /// Sender, as the dialog engine knows them.
    pub owner: OwnerId,
    /// Chat the reply goes to.
    pub chat_id: String,
    /// What was sent.
    pub payload: EventPayload,
    /// Timestamp when the message was received.
    pub timestamp: SystemTime,
}

impl InboundMessage {
    /// Create an inbound message.
    pub fn new(
        channel: impl Into<String>,
        owner: OwnerId,
        chat_id: impl Into<String>,
        payload: EventPayload,
    ) -> Self {
        Self {
            id: generate_id("msg"),
            channel: channel.into(),
            owner,
            chat_id: chat_id.into(),
            payload,
            timestamp: SystemTime::now(),
        }
    }

    /// A text message.
    pub fn text(
        channel: impl Into<String>,
        owner: OwnerId,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let payload = EventPayload::Text {
            content: content.into(),
        };
        Self::new(channel, owner, chat_id, payload)
    }

    /// A photo.
    pub fn photo(
        channel: impl Into<String>,
        owner: OwnerId,
        chat_id: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        let payload = EventPayload::Photo {
            reference: needle::value::PhotoRef::new(reference),
        };
        Self::new(channel, owner, chat_id, payload)
    }

    /// An inline button press.
    pub fn button(
        channel: impl Into<String>,
        owner: OwnerId,
        chat_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let payload = EventPayload::Button {
            token: token.into(),
        };
        Self::new(channel, owner, chat_id, payload)
    }

    /// The dialog engine's view of this message.
    #[must_use]
    pub fn to_event(&self) -> InboundEvent {
        InboundEvent {
            owner: self.owner,
            payload: self.payload.clone(),
        }
    }

    /// Short description for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self.payload {
            EventPayload::Text { .. } => "text",
            EventPayload::Photo { .. } => "photo",
            EventPayload::Button { .. } => "button",
        }
    }
}

/// A message for a channel to deliver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Unique message ID.
    pub id: String,
    /// Target channel identifier.
    pub channel: String,
    /// Target chat identifier.
    pub chat_id: String,
    /// Message text content.
    pub content: String,
    /// Inline buttons, one inner vector per row.
    #[serde(default)]
    pub keyboard: Keyboard,
    /// Message format hint for the channel.
    pub format: MessageFormat,
}

/// Message format hint for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    /// Plain text, no formatting.
    #[default]
    Plain,
    /// Markdown formatted text.
    Markdown,
    /// HTML formatted text.
    Html,
}

impl OutboundMessage {
    /// Create a plain outbound message without buttons.
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_id("msg"),
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            keyboard: Keyboard::new(),
            format: MessageFormat::default(),
        }
    }

    /// Create a Markdown response to an inbound message.
    pub fn reply_to(msg: &InboundMessage, content: impl Into<String>) -> Self {
        Self::new(msg.channel.clone(), msg.chat_id.clone(), content)
            .with_format(MessageFormat::Markdown)
    }

    /// Set message format.
    #[must_use]
    pub const fn with_format(mut self, format: MessageFormat) -> Self {
        self.format = format;
        self
    }

    /// Attach inline buttons.
    #[must_use]
    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = keyboard;
        self
    }

    /// Whether the message carries buttons.
    #[must_use]
    pub fn has_keyboard(&self) -> bool {
        self.keyboard.iter().any(|row| !row.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use needle::transport::Button;

    #[test]
    fn test_inbound_message_creation() {
        let msg = InboundMessage::text("telegram", 42, "chat456", "сегодня");
        assert_eq!(msg.channel, "telegram");
        assert_eq!(msg.owner, 42);
        assert_eq!(msg.chat_id, "chat456");
        assert_eq!(msg.kind(), "text");
        assert_eq!(msg.to_event(), InboundEvent::text(42, "сегодня"));
    }

    #[test]
    fn test_button_and_photo_map_to_events() {
        let press = InboundMessage::button("cli", 7, "direct", "cancel");
        assert_eq!(press.to_event(), InboundEvent::button(7, "cancel"));

        let photo = InboundMessage::photo("telegram", 7, "7", "file-abc");
        assert_eq!(photo.kind(), "photo");
        assert_eq!(photo.to_event(), InboundEvent::photo(7, "file-abc"));
    }

    #[test]
    fn test_outbound_reply() {
        let inbound = InboundMessage::text("telegram", 1, "chat456", "Hi");
        let outbound = OutboundMessage::reply_to(&inbound, "Hello back!")
            .with_keyboard(vec![vec![Button::new("❌ Отмена", "cancel")]]);

        assert_eq!(outbound.channel, "telegram");
        assert_eq!(outbound.chat_id, "chat456");
        assert_eq!(outbound.format, MessageFormat::Markdown);
        assert!(outbound.has_keyboard());
        assert!(!OutboundMessage::new("cli", "direct", "x").has_keyboard());
    }

    #[test]
    fn test_message_id_uniqueness() {
        let a = InboundMessage::text("cli", 1, "direct", "a");
        let b = InboundMessage::text("cli", 1, "direct", "a");
        assert_ne!(a.id, b.id);
    }
}
