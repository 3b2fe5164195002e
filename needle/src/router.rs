//! Starting new dialogs.
//!
//! Sessions only come into existence through [`FlowRouter::start`] or
//! [`FlowRouter::start_with`]. Starting a flow replaces whatever session the
//! owner had.

use crate::OwnerId;
use crate::engine::{Outcome, Shared};
use crate::error::{EngineError, EngineResult};
use crate::flow::FlowType;
use crate::session::Session;
use crate::value::Fields;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Starts sessions on behalf of an entry point (menu button, command, ...).
#[derive(Clone)]
pub struct FlowRouter {
    shared: Arc<Shared>,
}

impl fmt::Debug for FlowRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowRouter").finish_non_exhaustive()
    }
}

impl FlowRouter {
    pub(crate) const fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Start `flow` for `owner` at step 0 and send its first question.
    ///
    /// # Errors
    ///
    /// Fails if the flow is not registered, needs seed fields, or the session
    /// store fails.
    pub async fn start(&self, owner: OwnerId, flow: FlowType) -> EngineResult<Outcome> {
        self.start_with(owner, flow, Fields::new()).await
    }

    /// Start `flow` with pre-populated fields.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingSeed`] if a seed field the flow declares
    /// has no value in `seed`, [`EngineError::UnknownFlow`] if the flow is not
    /// registered, and [`EngineError::Sessions`] if the session store fails.
    pub async fn start_with(
        &self,
        owner: OwnerId,
        flow: FlowType,
        seed: Fields,
    ) -> EngineResult<Outcome> {
        let definition = self
            .shared
            .registry
            .get(flow)
            .ok_or(EngineError::UnknownFlow(flow))?;
        if let Some(field) = definition
            .seed_fields
            .iter()
            .copied()
            .find(|field| seed.get(field).is_none())
        {
            return Err(EngineError::MissingSeed { flow, field });
        }

        let _guard = self.shared.locks.acquire(owner).await;

        if let Some(previous) = self.shared.sessions.get(owner).await? {
            debug!(owner = %owner, previous = %previous.flow, step = previous.step, "replacing session");
        }
        let session = Session::new(owner, flow, self.shared.clock.now()).with_fields(seed);
        self.shared.sessions.put(session.clone()).await?;
        info!(owner = %owner, flow = %flow, "session started");

        self.shared.send_prompt(&definition, &session).await;
        Ok(Outcome::Started { flow })
    }
}
