//! Async message bus between channels and the gateway.
//!
//! Inbound messages from every channel share one queue; outbound messages are
//! routed to the subscribers of their target channel.

use crate::error::{BusError, BusResult};
use crate::events::{InboundMessage, OutboundMessage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, trace, warn};

/// Default capacity for message queues.
const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Async message bus.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<MessageBusInner>,
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus").finish_non_exhaustive()
    }
}

struct MessageBusInner {
    /// Inbound message queue (channels → gateway).
    inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: RwLock<Option<mpsc::Receiver<InboundMessage>>>,

    /// Per-channel outbound queues.
    channel_subscribers: RwLock<HashMap<String, Vec<mpsc::Sender<OutboundMessage>>>>,
    outbound_capacity: usize,

    /// Statistics.
    stats: RwLock<BusStats>,
}

/// Message bus statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    /// Total inbound messages published.
    pub inbound_count: u64,
    /// Total outbound messages delivered to at least one subscriber.
    pub outbound_count: u64,
    /// Outbound messages nobody was subscribed for.
    pub dropped_count: u64,
}

impl MessageBus {
    /// Create a new message bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        MessageBusBuilder::new().build()
    }

    /// Create a new message bus with specified queue capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        MessageBusBuilder::new()
            .inbound_capacity(capacity)
            .outbound_capacity(capacity)
            .build()
    }

    /// Publish a message received by a channel.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InboundClosed`] once the consumer is gone.
    pub async fn publish_inbound(&self, msg: InboundMessage) -> BusResult<()> {
        trace!(channel = %msg.channel, owner = msg.owner, kind = msg.kind(), "publishing inbound message");

        self.inner
            .inbound_tx
            .send(msg)
            .await
            .map_err(|_| BusError::InboundClosed)?;

        self.inner.stats.write().await.inbound_count += 1;
        Ok(())
    }

    /// Consume the next inbound message. Returns `None` when the bus is closed.
    pub async fn consume_inbound(&self) -> Option<InboundMessage> {
        let mut rx_guard = self.inner.inbound_rx.write().await;
        match rx_guard.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Consume the next inbound message, waiting at most `timeout`.
    pub async fn consume_inbound_timeout(&self, timeout: Duration) -> Option<InboundMessage> {
        let mut rx_guard = self.inner.inbound_rx.write().await;
        match rx_guard.as_mut() {
            Some(rx) => tokio::time::timeout(timeout, rx.recv())
                .await
                .ok()
                .flatten(),
            None => None,
        }
    }

    /// Route a message to every subscriber of its channel.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::OutboundClosed`] if no live subscriber received it.
    pub async fn publish_outbound(&self, msg: OutboundMessage) -> BusResult<()> {
        trace!(channel = %msg.channel, chat_id = %msg.chat_id, "publishing outbound message");

        let mut delivered = false;
        {
            let mut subscribers = self.inner.channel_subscribers.write().await;
            if let Some(senders) = subscribers.get_mut(&msg.channel) {
                senders.retain(|sender| !sender.is_closed());
                for sender in senders.iter() {
                    if sender.send(msg.clone()).await.is_ok() {
                        delivered = true;
                    } else {
                        debug!(channel = %msg.channel, "channel subscriber disconnected");
                    }
                }
            }
        }

        let mut stats = self.inner.stats.write().await;
        if delivered {
            stats.outbound_count += 1;
            Ok(())
        } else {
            stats.dropped_count += 1;
            warn!(channel = %msg.channel, "no subscriber for outbound message");
            Err(BusError::OutboundClosed)
        }
    }

    /// Subscribe to outbound messages targeted at `channel`.
    pub async fn subscribe_channel(&self, channel: &str) -> mpsc::Receiver<OutboundMessage> {
        let (tx, rx) = mpsc::channel(self.inner.outbound_capacity);

        let mut subscribers = self.inner.channel_subscribers.write().await;
        subscribers.entry(channel.to_string()).or_default().push(tx);

        debug!(channel = %channel, "new channel subscriber registered");
        rx
    }

    /// Get current bus statistics.
    pub async fn stats(&self) -> BusStats {
        *self.inner.stats.read().await
    }

    /// Create a handle for publishing inbound messages.
    #[must_use]
    pub fn inbound_handle(&self) -> InboundHandle {
        InboundHandle {
            tx: self.inner.inbound_tx.clone(),
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Lightweight handle for publishing inbound messages.
#[derive(Debug, Clone)]
pub struct InboundHandle {
    tx: mpsc::Sender<InboundMessage>,
}

impl InboundHandle {
    /// Publish an inbound message.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InboundClosed`] once the consumer is gone.
    pub async fn publish(&self, msg: InboundMessage) -> BusResult<()> {
        self.tx.send(msg).await.map_err(|_| BusError::InboundClosed)
    }
}

/// Builder for configuring a message bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageBusBuilder {
    inbound_capacity: Option<usize>,
    outbound_capacity: Option<usize>,
}

impl MessageBusBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the inbound queue capacity.
    #[must_use]
    pub const fn inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = Some(capacity);
        self
    }

    /// Set the capacity of each channel's outbound queue.
    #[must_use]
    pub const fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = Some(capacity);
        self
    }

    /// Build the message bus.
    #[must_use]
    pub fn build(self) -> MessageBus {
        let inbound_cap = self.inbound_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(inbound_cap);

        MessageBus {
            inner: Arc::new(MessageBusInner {
                inbound_tx,
                inbound_rx: RwLock::new(Some(inbound_rx)),
                channel_subscribers: RwLock::new(HashMap::new()),
                outbound_capacity: self.outbound_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
                stats: RwLock::new(BusStats::default()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inbound_message_flow() {
        let bus = MessageBus::new();

        let msg = InboundMessage::text("test", 1, "chat1", "Hello");
        bus.publish_inbound(msg).await.unwrap();

        let received = bus
            .consume_inbound_timeout(Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(received.owner, 1);
        assert_eq!(received.kind(), "text");
    }

    #[tokio::test]
    async fn test_inbound_timeout_without_messages() {
        let bus = MessageBus::new();
        assert!(
            bus.consume_inbound_timeout(Duration::from_millis(10))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_channel_subscription() {
        let bus = MessageBus::new();
        let mut rx = bus.subscribe_channel("telegram").await;
        let _cli = bus.subscribe_channel("cli").await;

        bus.publish_outbound(OutboundMessage::new("telegram", "chat1", "For Telegram"))
            .await
            .unwrap();
        bus.publish_outbound(OutboundMessage::new("cli", "direct", "For CLI"))
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.content, "For Telegram");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_outbound_without_subscriber_is_dropped() {
        let bus = MessageBus::new();
        let err = bus
            .publish_outbound(OutboundMessage::new("telegram", "1", "lost"))
            .await
            .unwrap_err();
        assert_eq!(err, BusError::OutboundClosed);

        let rx = bus.subscribe_channel("telegram").await;
        drop(rx);
        assert!(
            bus.publish_outbound(OutboundMessage::new("telegram", "1", "lost"))
                .await
                .is_err()
        );
        assert_eq!(bus.stats().await.dropped_count, 2);
    }

    #[tokio::test]
    async fn test_stats() {
        let bus = MessageBus::with_capacity(8);
        let _rx = bus.subscribe_channel("test").await;

        bus.inbound_handle()
            .publish(InboundMessage::text("test", 1, "c", "in"))
            .await
            .unwrap();
        bus.publish_inbound(InboundMessage::text("test", 1, "c", "in"))
            .await
            .unwrap();
        bus.publish_outbound(OutboundMessage::new("test", "c", "out"))
            .await
            .unwrap();

        let stats = bus.stats().await;
        // The handle bypasses the counter.
        assert_eq!(stats.inbound_count, 1);
        assert_eq!(stats.outbound_count, 1);
        assert_eq!(stats.dropped_count, 0);
    }
}
