//! In-memory collaborators for tests.
//!
//! These let engine scenarios run without a real transport, clock or store.

use crate::OwnerId;
use crate::clock::Clock;
use crate::error::{DeliveryError, DeliveryResult, StoreError, StoreResult};
use crate::record::{Record, RecordKind};
use crate::store::RecordStore;
use crate::transport::{Keyboard, Transport};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::sync::{Mutex, PoisonError};

// ============================================================================
// Transport
// ============================================================================

/// Kind of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentKind {
    /// A question.
    Prompt,
    /// An acknowledgment.
    Ack,
}

/// One recorded outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    /// Recipient.
    pub owner: OwnerId,
    /// Prompt or acknowledgment.
    pub kind: SentKind,
    /// Text.
    pub text: String,
    /// Buttons (always empty for acknowledgments).
    pub keyboard: Keyboard,
}

impl Sent {
    /// Whether any button carries `token`.
    #[must_use]
    pub fn has_button(&self, token: &str) -> bool {
        self.keyboard.iter().flatten().any(|b| b.token == token)
    }
}

/// Transport that records everything it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingTransport {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Sent> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent message.
    #[must_use]
    pub fn last(&self) -> Option<Sent> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Forget recorded messages.
    pub fn clear(&self) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn push(&self, sent: Sent) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sent);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn prompt(
        &self,
        owner: OwnerId,
        text: &str,
        keyboard: &Keyboard,
    ) -> DeliveryResult<()> {
        self.push(Sent {
            owner,
            kind: SentKind::Prompt,
            text: text.to_string(),
            keyboard: keyboard.clone(),
        });
        Ok(())
    }

    async fn acknowledge(&self, owner: OwnerId, text: &str) -> DeliveryResult<()> {
        self.push(Sent {
            owner,
            kind: SentKind::Ack,
            text: text.to_string(),
            keyboard: Keyboard::new(),
        });
        Ok(())
    }
}

/// Transport whose every send fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingTransport;

#[async_trait]
impl Transport for FailingTransport {
    async fn prompt(&self, _: OwnerId, _: &str, _: &Keyboard) -> DeliveryResult<()> {
        Err(DeliveryError::send("network down"))
    }

    async fn acknowledge(&self, _: OwnerId, _: &str) -> DeliveryResult<()> {
        Err(DeliveryError::Closed)
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Manually driven clock.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    /// Clock stopped at `now`.
    #[must_use]
    pub const fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Clock stopped at noon on the given day.
    ///
    /// # Panics
    ///
    /// Panics if the date is invalid.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn at_noon(year: i32, month: u32, day: u32) -> Self {
        let now = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid date");
        Self::new(now)
    }

    /// Move the clock forward.
    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Store
// ============================================================================

/// Record store that is always unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRecordStore;

#[async_trait]
impl RecordStore for UnavailableRecordStore {
    async fn save(&self, _: OwnerId, _: Record) -> StoreResult<()> {
        Err(StoreError::Unavailable("disk full".into()))
    }

    async fn list(&self, _: OwnerId, _: RecordKind) -> StoreResult<Vec<Record>> {
        Ok(Vec::new())
    }
}
