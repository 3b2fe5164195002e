//! In-progress dialog state.
//!
//! Every owner has at most one [`Session`]; the [`SessionStore`] is keyed by
//! owner id so that invariant holds by construction.

mod state;
mod storage;

pub use state::Session;
pub use storage::{MemorySessionStore, SessionStore};
