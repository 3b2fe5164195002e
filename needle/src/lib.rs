//! Needle - a multi-flow dialog engine for turn-based chat data entry.
//!
//! Users of a chat bot carry out short dialogs (add a progress entry, add a
//! project, delete an entry, ...) that ask one question per turn, validate the
//! answer, and finally commit a structured [`Record`](record::Record).
//!
//! # Architecture
//!
//! - **Flows** ([`flow`]) - declarative dialog definitions: ordered steps with
//!   an input kind, a validator and a prompt, plus a finisher
//! - **Sessions** ([`session`]) - at most one in-progress dialog per owner
//! - **Input** ([`input`]) - classification of inbound events
//! - **Engine** ([`engine`]) - advances, re-prompts, cancels and completes
//!   sessions, with per-owner ordering
//! - **Router** ([`router`]) - the only way a session comes into existence
//! - **Commit** ([`commit`]) - hands finished records to the record store and
//!   runs post-commit hooks
//!
//! Transport and persistence are collaborators behind the [`Transport`](transport::Transport)
//! and [`RecordStore`](store::RecordStore) traits.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use needle::prelude::*;
//! use std::sync::Arc;
//!
//! let engine = DialogEngine::builder()
//!     .records(Arc::new(MemoryRecordStore::new()))
//!     .transport(Arc::new(my_transport))
//!     .build()?;
//!
//! engine.router().start(42, FlowType::AddEntry).await?;
//! let outcome = engine.handle(InboundEvent::text(42, "сегодня")).await?;
//! assert!(outcome.is_handled());
//! ```

pub mod clock;
pub mod commit;
pub mod engine;
pub mod error;
pub mod flow;
pub mod format;
pub mod input;
pub mod record;
pub mod router;
pub mod session;
pub mod store;
pub mod testing;
pub mod transport;
pub mod util;
pub mod value;

/// Stable identifier of a chat user; sessions and records are keyed by it.
pub type OwnerId = i64;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::OwnerId;

    // Errors
    pub use crate::error::{
        CommitError, DeliveryError, DeliveryResult, EngineError, EngineResult, FinishError,
        HookError, StoreError, StoreResult, ValidationError,
    };

    // Engine
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::commit::{CommitHandoff, CommitHook, PendingHooks};
    pub use crate::engine::{DialogEngine, DialogEngineBuilder, EngineConfig, Outcome};
    pub use crate::router::FlowRouter;

    // Flows
    pub use crate::flow::{
        FlowDefinition, FlowRegistry, FlowType, InputKind, PromptHint, StepDefinition,
    };

    // Input
    pub use crate::input::{DialogInput, EventPayload, InboundEvent, InputClassifier};

    // Records and values
    pub use crate::record::{
        EntryRemoval, Note, Plan, ProgressEntry, Project, ProjectPhoto, Record, RecordKind,
        WishlistItem,
    };
    pub use crate::value::{FieldValue, Fields, PhotoRef};

    // Sessions and stores
    pub use crate::session::{MemorySessionStore, Session, SessionStore};
    pub use crate::store::{MemoryRecordStore, RecordStore};

    // Transport
    pub use crate::transport::{Button, Keyboard, Transport};
}
