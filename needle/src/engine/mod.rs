//! The dialog engine.
//!
//! [`DialogEngine::handle`] consumes one inbound event: it classifies it, looks
//! up the owner's session and either advances the session, re-prompts the
//! current step, cancels, completes (finisher plus commit), or reports the
//! event as [`Outcome::Unhandled`] so the caller can try other handlers.
//!
//! Events of the same owner are processed one at a time; different owners
//! proceed concurrently.

mod locks;

#[cfg(test)]
mod proptests;
#[cfg(test)]
mod scenarios;

use crate::OwnerId;
use crate::clock::{Clock, SystemClock};
use crate::commit::{CommitHandoff, CommitHook};
use crate::error::{CommitError, EngineError, EngineResult};
use crate::flow::{
    FinishContext, FlowDefinition, FlowRegistry, FlowType, InputKind, PromptHint, StepContext,
    StepDefinition, StepInput, is_skip_text,
};
use crate::input::{CANCEL_TOKEN, DialogInput, InboundEvent, InputClassifier};
use crate::record::RecordKind;
use crate::router::FlowRouter;
use crate::session::{MemorySessionStore, Session, SessionStore};
use crate::store::{RecordStore, known_hashtags};
use crate::transport::{Button, Keyboard, Transport};
use crate::value::FieldValue;
use locks::OwnerLocks;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Acknowledgment sent on cancel.
pub const CANCELLED_TEXT: &str = "❌ Отменено";

/// Acknowledgment sent when a finished dialog could not be saved.
pub const COMMIT_FAILED_TEXT: &str =
    "❌ Не удалось сохранить. Введенные данные потеряны, начните заново.";

const MAX_HASHTAGS_SHOWN: usize = 5;

// ============================================================================
// Configuration and outcome
// ============================================================================

/// Engine tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Idle sessions older than this are treated as absent. `None` keeps
    /// sessions until they are completed, cancelled or replaced.
    pub session_ttl: Option<Duration>,
}

impl EngineConfig {
    /// Set the idle session lifetime.
    #[must_use]
    pub const fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = Some(ttl);
        self
    }
}

/// What happened to an event.
#[derive(Debug)]
pub enum Outcome {
    /// The event does not belong to an active dialog.
    Unhandled,
    /// A new session was started at step 0.
    Started {
        /// Started flow.
        flow: FlowType,
    },
    /// The answer was accepted and the next question asked.
    Advanced {
        /// Active flow.
        flow: FlowType,
        /// New step index.
        step: usize,
    },
    /// The answer was rejected; the same question was asked again.
    Retry {
        /// Active flow.
        flow: FlowType,
        /// Unchanged step index.
        step: usize,
        /// Hint shown to the user.
        hint: String,
    },
    /// The last answer completed the dialog and the record was committed.
    Completed {
        /// Finished flow.
        flow: FlowType,
        /// Kind of the committed record.
        kind: RecordKind,
    },
    /// The dialog finished but its record could not be committed. The
    /// session is gone either way.
    CommitFailed {
        /// Finished flow.
        flow: FlowType,
        /// Cause.
        error: CommitError,
    },
    /// The owner cancelled. `flow` is `None` when nothing was active.
    Cancelled {
        /// Cancelled flow.
        flow: Option<FlowType>,
    },
}

impl Outcome {
    /// Whether the engine consumed the event.
    #[must_use]
    pub const fn is_handled(&self) -> bool {
        !matches!(self, Self::Unhandled)
    }
}

// ============================================================================
// Engine
// ============================================================================

/// State shared by the engine and its router.
pub(crate) struct Shared {
    pub(crate) registry: FlowRegistry,
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) handoff: CommitHandoff,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) classifier: InputClassifier,
    pub(crate) config: EngineConfig,
    pub(crate) locks: OwnerLocks,
}

/// How an input relates to the current step.
enum Answer {
    Skip,
    Value(StepInput),
    Foreign,
}

impl Shared {
    /// The owner's session, evicting it first if it outlived the TTL.
    pub(crate) async fn load_session(&self, owner: OwnerId) -> EngineResult<Option<Session>> {
        let Some(session) = self.sessions.get(owner).await? else {
            return Ok(None);
        };
        if let Some(ttl) = self.config.session_ttl
            && session.is_expired(ttl, self.clock.now())
        {
            info!(owner = %owner, flow = %session.flow, step = session.step, "session expired");
            self.sessions.remove(owner).await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Ask the question of the session's current step.
    pub(crate) async fn send_prompt(&self, definition: &FlowDefinition, session: &Session) {
        if let Some(step) = definition.step_at(session.step) {
            let text = self.render_prompt(definition, session, step).await;
            self.deliver_prompt(session.owner, &text, &keyboard_for(step))
                .await;
        }
    }

    async fn render_prompt(
        &self,
        definition: &FlowDefinition,
        session: &Session,
        step: &StepDefinition,
    ) -> String {
        let mut text = step.render_prompt(&session.fields);
        if session.step == 0 {
            text = format!("{}\n\n{text}", definition.title);
        }
        if step.hint == Some(PromptHint::KnownHashtags) {
            match known_hashtags(self.handoff.store().as_ref(), session.owner).await {
                Ok(tags) if !tags.is_empty() => {
                    let shown: Vec<_> = tags
                        .iter()
                        .take(MAX_HASHTAGS_SHOWN)
                        .map(|t| format!("#{t}"))
                        .collect();
                    text.push_str("\n\n💡 Ваши хэштеги: ");
                    text.push_str(&shown.join(", "));
                    if tags.len() > MAX_HASHTAGS_SHOWN {
                        text.push_str("...");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(owner = %session.owner, error = %e, "failed to load hashtags for prompt");
                }
            }
        }
        text
    }

    pub(crate) async fn deliver_prompt(&self, owner: OwnerId, text: &str, keyboard: &Keyboard) {
        if let Err(e) = self.transport.prompt(owner, text, keyboard).await {
            warn!(owner = %owner, error = %e, "prompt delivery failed");
        }
    }

    pub(crate) async fn deliver_ack(&self, owner: OwnerId, text: &str) {
        if let Err(e) = self.transport.acknowledge(owner, text).await {
            warn!(owner = %owner, error = %e, "acknowledgment delivery failed");
        }
    }
}

fn keyboard_for(step: &StepDefinition) -> Keyboard {
    let mut keyboard = Keyboard::new();
    if !step.choices.is_empty() {
        keyboard.push(step.choices.iter().map(|c| c.button.clone()).collect());
    }
    if let Some(token) = step.skip_token.as_deref().filter(|_| step.optional) {
        keyboard.push(vec![Button::new("⏭️ Пропустить", token)]);
    }
    keyboard.push(vec![Button::new("❌ Отмена", CANCEL_TOKEN)]);
    keyboard
}

fn resolve(step: &StepDefinition, input: DialogInput) -> Answer {
    match input {
        DialogInput::FreeText(text) => {
            if step.optional && is_skip_text(&text) {
                Answer::Skip
            } else if step.input.accepts_text() {
                Answer::Value(StepInput::Text(text))
            } else {
                Answer::Foreign
            }
        }
        DialogInput::Photo(photo) => {
            if step.input == InputKind::Photo {
                Answer::Value(StepInput::Photo(photo))
            } else {
                Answer::Foreign
            }
        }
        DialogInput::ExplicitChoice(token) => {
            if step.is_skip_token(&token) {
                Answer::Skip
            } else if let Some(value) = step.choice_value(&token) {
                Answer::Value(StepInput::Text(value.to_string()))
            } else {
                Answer::Foreign
            }
        }
        // Cancels never reach step dispatch.
        DialogInput::CancelCommand => Answer::Foreign,
    }
}

/// Multi-flow dialog engine.
///
/// Cheap to clone; clones share sessions and collaborators.
#[derive(Clone)]
pub struct DialogEngine {
    shared: Arc<Shared>,
}

impl fmt::Debug for DialogEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogEngine")
            .field("priority", &self.shared.registry.priority())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl DialogEngine {
    /// Create a builder.
    #[must_use]
    pub fn builder() -> DialogEngineBuilder {
        DialogEngineBuilder::new()
    }

    /// The router that starts new sessions.
    #[must_use]
    pub fn router(&self) -> FlowRouter {
        FlowRouter::new(Arc::clone(&self.shared))
    }

    /// The registered flows.
    #[must_use]
    pub fn registry(&self) -> &FlowRegistry {
        &self.shared.registry
    }

    /// The session store.
    #[must_use]
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.shared.sessions
    }

    /// The record store.
    #[must_use]
    pub fn records(&self) -> &Arc<dyn RecordStore> {
        self.shared.handoff.store()
    }

    /// The owner's live session, if any.
    ///
    /// # Errors
    ///
    /// Fails if the session store fails.
    pub async fn session(&self, owner: OwnerId) -> EngineResult<Option<Session>> {
        self.shared.load_session(owner).await
    }

    /// Process one inbound event.
    ///
    /// # Errors
    ///
    /// Fails only if the session store fails or a session names an
    /// unregistered flow. Invalid answers, delivery failures and commit
    /// failures are reported through [`Outcome`].
    pub async fn handle(&self, event: InboundEvent) -> EngineResult<Outcome> {
        let owner = event.owner;
        let Some(input) = self.shared.classifier.classify(&event) else {
            trace!(owner = %owner, "command left to caller");
            return Ok(Outcome::Unhandled);
        };

        let _guard = self.shared.locks.acquire(owner).await;

        if input == DialogInput::CancelCommand {
            return self.cancel(owner).await;
        }

        let Some(mut session) = self.shared.load_session(owner).await? else {
            trace!(owner = %owner, input = input.label(), "no active session");
            return Ok(Outcome::Unhandled);
        };
        let definition = self
            .shared
            .registry
            .interpreter_for(&session)
            .ok_or(EngineError::UnknownFlow(session.flow))?;
        let Some(step) = definition.step_at(session.step) else {
            warn!(owner = %owner, flow = %session.flow, step = session.step, "session step out of range, dropping");
            self.shared.sessions.remove(owner).await?;
            return Ok(Outcome::Unhandled);
        };

        let label = input.label();
        let value = match resolve(step, input) {
            Answer::Foreign => {
                debug!(owner = %owner, flow = %session.flow, step = session.step, input = label, "input does not match step");
                return Ok(Outcome::Unhandled);
            }
            Answer::Skip => None,
            Answer::Value(answer) => match self.validate(step, &answer, &session).await {
                Ok(value) => Some(value),
                Err(hint) => {
                    let prompt = self.shared.render_prompt(&definition, &session, step).await;
                    let text = format!("❌ {hint}\n\n{prompt}");
                    self.shared
                        .deliver_prompt(owner, &text, &keyboard_for(step))
                        .await;
                    debug!(owner = %owner, flow = %session.flow, step = session.step, "answer rejected");
                    return Ok(Outcome::Retry {
                        flow: session.flow,
                        step: session.step,
                        hint,
                    });
                }
            },
        };

        session.advance(step.field, value, self.shared.clock.now());

        if definition.is_complete(session.step) {
            return self.complete(&definition, session).await;
        }

        self.shared.sessions.put(session.clone()).await?;
        debug!(owner = %owner, flow = %session.flow, step = session.step, "session advanced");
        self.shared.send_prompt(&definition, &session).await;
        Ok(Outcome::Advanced {
            flow: session.flow,
            step: session.step,
        })
    }

    async fn validate(
        &self,
        step: &StepDefinition,
        answer: &StepInput,
        session: &Session,
    ) -> Result<FieldValue, String> {
        let ctx = StepContext {
            owner: session.owner,
            today: self.shared.clock.today(),
            records: self.shared.handoff.store().as_ref(),
            fields: &session.fields,
        };
        step.validator
            .validate(answer, &ctx)
            .await
            .map_err(|e| e.hint().to_string())
    }

    async fn complete(&self, definition: &FlowDefinition, session: Session) -> EngineResult<Outcome> {
        let owner = session.owner;
        let flow = session.flow;
        let ctx = FinishContext {
            owner,
            now: self.shared.clock.now(),
        };
        let finished = (definition.finisher)(&session.fields, &ctx);
        self.shared.sessions.remove(owner).await?;

        let record = match finished {
            Ok(record) => record,
            Err(e) => {
                error!(owner = %owner, flow = %flow, error = %e, "finisher failed");
                self.shared.deliver_ack(owner, COMMIT_FAILED_TEXT).await;
                return Ok(Outcome::CommitFailed {
                    flow,
                    error: e.into(),
                });
            }
        };

        let kind = record.kind();
        let summary = record.summary();
        match self
            .shared
            .handoff
            .commit(owner, record, definition.notify_hooks)
            .await
        {
            Ok(hooks) => {
                info!(owner = %owner, flow = %flow, kind = %kind, "dialog completed");
                self.shared.deliver_ack(owner, &summary).await;
                hooks.run().await;
                Ok(Outcome::Completed { flow, kind })
            }
            Err(e) => {
                error!(owner = %owner, flow = %flow, error = %e, "commit failed");
                self.shared.deliver_ack(owner, COMMIT_FAILED_TEXT).await;
                Ok(Outcome::CommitFailed { flow, error: e })
            }
        }
    }

    async fn cancel(&self, owner: OwnerId) -> EngineResult<Outcome> {
        let flow = self.shared.sessions.get(owner).await?.map(|s| s.flow);
        self.shared.sessions.remove(owner).await?;
        match flow {
            Some(flow) => info!(owner = %owner, flow = %flow, "session cancelled"),
            None => debug!(owner = %owner, "cancel without active session"),
        }
        self.shared.deliver_ack(owner, CANCELLED_TEXT).await;
        Ok(Outcome::Cancelled { flow })
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`DialogEngine`].
#[derive(Default)]
pub struct DialogEngineBuilder {
    registry: Option<FlowRegistry>,
    sessions: Option<Arc<dyn SessionStore>>,
    records: Option<Arc<dyn RecordStore>>,
    transport: Option<Arc<dyn Transport>>,
    hooks: Vec<Arc<dyn CommitHook>>,
    clock: Option<Arc<dyn Clock>>,
    classifier: Option<InputClassifier>,
    config: EngineConfig,
}

impl fmt::Debug for DialogEngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogEngineBuilder")
            .field("has_records", &self.records.is_some())
            .field("has_transport", &self.transport.is_some())
            .field("hooks", &self.hooks.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DialogEngineBuilder {
    /// Create a builder with the standard flows and in-memory sessions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom flow registry.
    #[must_use]
    pub fn registry(mut self, registry: FlowRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use a custom session store.
    #[must_use]
    pub fn sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Set the record store (required).
    #[must_use]
    pub fn records(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    /// Set the transport (required).
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Add a post-commit hook.
    #[must_use]
    pub fn hook(mut self, hook: Arc<dyn CommitHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Use a custom clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use a custom input classifier.
    #[must_use]
    pub fn classifier(mut self, classifier: InputClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Set the engine configuration.
    #[must_use]
    pub const fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Incomplete`] if the record store or transport
    /// is missing.
    pub fn build(self) -> EngineResult<DialogEngine> {
        let records = self
            .records
            .ok_or(EngineError::Incomplete("a record store"))?;
        let transport = self
            .transport
            .ok_or(EngineError::Incomplete("a transport"))?;
        let handoff = self
            .hooks
            .into_iter()
            .fold(CommitHandoff::new(records), CommitHandoff::with_hook);

        Ok(DialogEngine {
            shared: Arc::new(Shared {
                registry: self.registry.unwrap_or_default(),
                sessions: self
                    .sessions
                    .unwrap_or_else(|| Arc::new(MemorySessionStore::new())),
                handoff,
                transport,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                classifier: self.classifier.unwrap_or_default(),
                config: self.config,
                locks: OwnerLocks::default(),
            }),
        })
    }
}
