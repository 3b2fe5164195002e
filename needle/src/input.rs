//! Inbound events and their classification into dialog inputs.

use crate::OwnerId;
use crate::value::PhotoRef;
use serde::{Deserialize, Serialize};

/// Token of the cancel button rendered under every prompt.
pub const CANCEL_TOKEN: &str = "cancel";

/// Raw payload of an inbound event as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// A plain text message.
    Text {
        /// Message text.
        content: String,
    },
    /// A photo.
    Photo {
        /// Transport-specific handle.
        reference: PhotoRef,
    },
    /// An inline button press.
    Button {
        /// Callback token of the pressed button.
        token: String,
    },
}

/// An event received from one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Sender.
    pub owner: OwnerId,
    /// What was sent.
    pub payload: EventPayload,
}

impl InboundEvent {
    /// A text message.
    pub fn text(owner: OwnerId, content: impl Into<String>) -> Self {
        Self {
            owner,
            payload: EventPayload::Text {
                content: content.into(),
            },
        }
    }

    /// A photo.
    pub fn photo(owner: OwnerId, reference: impl Into<String>) -> Self {
        Self {
            owner,
            payload: EventPayload::Photo {
                reference: PhotoRef::new(reference),
            },
        }
    }

    /// A button press.
    pub fn button(owner: OwnerId, token: impl Into<String>) -> Self {
        Self {
            owner,
            payload: EventPayload::Button {
                token: token.into(),
            },
        }
    }
}

/// Semantic kind of an inbound event, as consumed by step validators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogInput {
    /// Plain text that is not a command.
    FreeText(String),
    /// A photo reference.
    Photo(PhotoRef),
    /// A button press that is not a cancel.
    ExplicitChoice(String),
    /// Cancel the active dialog.
    CancelCommand,
}

impl DialogInput {
    /// Short label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::FreeText(_) => "text",
            Self::Photo(_) => "photo",
            Self::ExplicitChoice(_) => "choice",
            Self::CancelCommand => "cancel",
        }
    }
}

/// Bare name of a bot command: `"/start@my_bot now"` gives `"start"`.
///
/// Returns `None` when `text` does not start with `prefix` or names nothing.
#[must_use]
pub fn command_name(text: &str, prefix: char) -> Option<&str> {
    let command = text.trim().strip_prefix(prefix)?;
    let name = command.split_whitespace().next()?;
    name.split('@').next().filter(|n| !n.is_empty())
}

/// Turns inbound events into [`DialogInput`]s.
///
/// Text starting with the command prefix is never free text: a cancel command
/// becomes [`DialogInput::CancelCommand`] and any other command is left to
/// the caller (`None`).
#[derive(Debug, Clone)]
pub struct InputClassifier {
    command_prefix: char,
    cancel_commands: Vec<String>,
    cancel_tokens: Vec<String>,
}

impl Default for InputClassifier {
    fn default() -> Self {
        Self {
            command_prefix: '/',
            cancel_commands: vec!["cancel".to_string()],
            cancel_tokens: vec![CANCEL_TOKEN.to_string()],
        }
    }
}

impl InputClassifier {
    /// Create a classifier recognizing `/cancel` and the `cancel` button.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also treat `/<command>` as a cancel.
    #[must_use]
    pub fn with_cancel_command(mut self, command: impl Into<String>) -> Self {
        self.cancel_commands.push(command.into());
        self
    }

    /// Also treat the button `token` as a cancel.
    #[must_use]
    pub fn with_cancel_token(mut self, token: impl Into<String>) -> Self {
        self.cancel_tokens.push(token.into());
        self
    }

    /// Classify an event. Returns `None` for commands other than cancel.
    #[must_use]
    pub fn classify(&self, event: &InboundEvent) -> Option<DialogInput> {
        match &event.payload {
            EventPayload::Text { content } => {
                let trimmed = content.trim();
                if trimmed.starts_with(self.command_prefix) {
                    self.is_cancel_command(trimmed)
                        .then_some(DialogInput::CancelCommand)
                } else {
                    Some(DialogInput::FreeText(trimmed.to_string()))
                }
            }
            EventPayload::Photo { reference } => Some(DialogInput::Photo(reference.clone())),
            EventPayload::Button { token } => {
                if self.cancel_tokens.iter().any(|t| t == token) {
                    Some(DialogInput::CancelCommand)
                } else {
                    Some(DialogInput::ExplicitChoice(token.clone()))
                }
            }
        }
    }

    fn is_cancel_command(&self, text: &str) -> bool {
        command_name(text, self.command_prefix).is_some_and(|name| {
            self.cancel_commands
                .iter()
                .any(|c| c.eq_ignore_ascii_case(name))
        })
    }
}
