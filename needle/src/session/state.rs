//! The session model.

use crate::OwnerId;
use crate::flow::FlowType;
use crate::value::{FieldValue, Fields};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One owner's active dialog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Owner of the dialog.
    pub owner: OwnerId,
    /// Which flow is running.
    pub flow: FlowType,
    /// Index of the step awaiting an answer.
    pub step: usize,
    /// Values collected by passed steps (plus seed fields).
    pub fields: Fields,
    /// When the flow was started.
    pub started_at: NaiveDateTime,
    /// Last successful advance.
    pub updated_at: NaiveDateTime,
}

impl Session {
    /// Create a session at step 0.
    #[must_use]
    pub fn new(owner: OwnerId, flow: FlowType, now: NaiveDateTime) -> Self {
        Self {
            owner,
            flow,
            step: 0,
            fields: Fields::new(),
            started_at: now,
            updated_at: now,
        }
    }

    /// Pre-populate fields that are not collected by any step.
    #[must_use]
    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    /// Record the answer for the current step and move to the next one.
    ///
    /// `None` marks a skipped optional step.
    pub fn advance(&mut self, field: &str, value: Option<FieldValue>, now: NaiveDateTime) {
        self.fields.set(field, value);
        self.step += 1;
        self.updated_at = now;
    }

    /// Whether the session has been idle longer than `ttl`.
    #[must_use]
    pub fn is_expired(&self, ttl: Duration, now: NaiveDateTime) -> bool {
        let idle = now.signed_duration_since(self.updated_at);
        idle.to_std().is_ok_and(|idle| idle > ttl)
    }
}
