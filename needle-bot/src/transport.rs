//! [`Transport`] implementation on top of the message bus.
//!
//! The engine addresses owners; channels address chats. The gateway records
//! where each owner last wrote from, and replies are routed there.

use crate::bus::MessageBus;
use crate::events::{InboundMessage, MessageFormat, OutboundMessage};
use async_trait::async_trait;
use needle::OwnerId;
use needle::error::{DeliveryError, DeliveryResult};
use needle::transport::{Keyboard, Transport};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::trace;

/// Where replies to one owner go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Channel name.
    pub channel: String,
    /// Chat within the channel.
    pub chat_id: String,
}

/// Publishes prompts and acknowledgments as [`OutboundMessage`]s.
#[derive(Debug)]
pub struct BusTransport {
    bus: MessageBus,
    routes: RwLock<HashMap<OwnerId, Route>>,
}

impl BusTransport {
    /// Create a transport publishing to `bus`.
    #[must_use]
    pub fn new(bus: MessageBus) -> Self {
        Self {
            bus,
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Route future replies to `owner` to the chat `msg` came from.
    pub async fn remember(&self, msg: &InboundMessage) {
        let route = Route {
            channel: msg.channel.clone(),
            chat_id: msg.chat_id.clone(),
        };
        self.routes.write().await.insert(msg.owner, route);
    }

    /// The current route to `owner`.
    pub async fn route(&self, owner: OwnerId) -> Option<Route> {
        self.routes.read().await.get(&owner).cloned()
    }

    async fn publish(&self, owner: OwnerId, text: &str, keyboard: Keyboard) -> DeliveryResult<()> {
        let route = self
            .route(owner)
            .await
            .ok_or_else(|| DeliveryError::send(format!("no route to owner {owner}")))?;
        trace!(owner = %owner, channel = %route.channel, "publishing reply");

        let msg = OutboundMessage::new(route.channel, route.chat_id, text)
            .with_format(MessageFormat::Markdown)
            .with_keyboard(keyboard);
        self.bus
            .publish_outbound(msg)
            .await
            .map_err(|_| DeliveryError::Closed)
    }
}

#[async_trait]
impl Transport for BusTransport {
    async fn prompt(
        &self,
        owner: OwnerId,
        text: &str,
        keyboard: &Keyboard,
    ) -> DeliveryResult<()> {
        self.publish(owner, text, keyboard.clone()).await
    }

    async fn acknowledge(&self, owner: OwnerId, text: &str) -> DeliveryResult<()> {
        self.publish(owner, text, Keyboard::new()).await
    }
}
