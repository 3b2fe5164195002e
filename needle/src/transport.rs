//! Outbound side of the messaging transport.

use crate::OwnerId;
use crate::error::DeliveryResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An inline button: a visible label and the token sent back when pressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Visible text.
    pub label: String,
    /// Callback token.
    pub token: String,
}

impl Button {
    /// Create a button.
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

/// Rows of inline buttons.
pub type Keyboard = Vec<Vec<Button>>;

/// Fire-and-forget delivery of prompts and acknowledgments to an owner.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Ask a question, optionally with buttons.
    async fn prompt(&self, owner: OwnerId, text: &str, keyboard: &Keyboard)
    -> DeliveryResult<()>;

    /// Send an acknowledgment without buttons.
    async fn acknowledge(&self, owner: OwnerId, text: &str) -> DeliveryResult<()>;
}
