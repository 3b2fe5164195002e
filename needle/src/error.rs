//! Error types for the dialog engine.
//!
//! Only [`EngineError`] ever reaches the caller of the engine as an `Err`.
//! Validation failures are recovered by re-prompting, delivery failures are
//! logged and swallowed, and commit failures are reported to the user and
//! surfaced as an [`Outcome`](crate::engine::Outcome) rather than an error.

use crate::flow::FlowType;

// ============================================================================
// Validation
// ============================================================================

/// User input did not satisfy a step's validator.
///
/// Carries a short corrective hint that is shown above the repeated question.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{hint}")]
pub struct ValidationError {
    hint: String,
}

impl ValidationError {
    /// Create a validation error with the given hint.
    #[must_use]
    pub fn new(hint: impl Into<String>) -> Self {
        Self { hint: hint.into() }
    }

    /// The corrective hint shown to the user.
    #[must_use]
    pub fn hint(&self) -> &str {
        &self.hint
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Error type for session and record stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Backend is not usable right now.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Create a not found error.
    #[inline]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ============================================================================
// Delivery
// ============================================================================

/// Error type for outbound prompt and acknowledgment delivery.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The transport is no longer accepting messages.
    #[error("transport closed")]
    Closed,

    /// The transport rejected the message.
    #[error("send failed: {0}")]
    SendFailed(String),
}

impl DeliveryError {
    /// Create a send failed error.
    #[inline]
    pub fn send(msg: impl Into<String>) -> Self {
        Self::SendFailed(msg.into())
    }
}

/// Result type for delivery operations.
pub type DeliveryResult<T> = std::result::Result<T, DeliveryError>;

// ============================================================================
// Commit
// ============================================================================

/// A finisher could not build a record from the collected fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FinishError {
    /// A required field has no value.
    #[error("missing field `{0}`")]
    MissingField(String),

    /// A field holds a value of the wrong type.
    #[error("field `{field}` is not a {expected}")]
    WrongType {
        /// Field name.
        field: String,
        /// Expected value type.
        expected: &'static str,
    },
}

/// Error type for the commit handoff.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    /// The finisher failed to build a record.
    #[error("finisher: {0}")]
    Finish(#[from] FinishError),

    /// The record store failed to save the record.
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

/// Error type for post-commit hooks.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// Store access inside the hook failed.
    #[error("store: {0}")]
    Store(#[from] StoreError),

    /// The hook could not notify the user.
    #[error("delivery: {0}")]
    Delivery(#[from] DeliveryError),

    /// Any other hook failure.
    #[error("{0}")]
    Failed(String),
}

// ============================================================================
// Engine
// ============================================================================

/// Errors that abort processing of an inbound event.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The session store failed.
    #[error("session store: {0}")]
    Sessions(#[from] StoreError),

    /// No definition is registered for the flow.
    #[error("no definition registered for flow {0}")]
    UnknownFlow(FlowType),

    /// A flow that needs seed fields was started without them.
    #[error("flow {flow} needs seed field `{field}`")]
    MissingSeed {
        /// The flow being started.
        flow: FlowType,
        /// The missing seed field.
        field: &'static str,
    },

    /// The engine was built without a required component.
    #[error("engine is missing {0}")]
    Incomplete(&'static str),

    /// The flow registry configuration is invalid.
    #[error("registry: {0}")]
    Registry(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
