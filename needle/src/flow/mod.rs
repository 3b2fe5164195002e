//! Declarative dialog definitions.
//!
//! A [`FlowDefinition`] is an ordered list of [`StepDefinition`]s plus a
//! finisher that turns the collected [`Fields`] into a [`Record`]. Definitions
//! are static: they are built once, registered in a [`FlowRegistry`] and never
//! mutated at runtime.

mod catalog;
mod registry;
pub mod validators;

pub use catalog::{PROJECT_ID, project_photo_seed};
pub use registry::{DEFAULT_PRIORITY, FlowRegistry};
pub use validators::{StepContext, StepInput, StepValidator};

use crate::OwnerId;
use crate::error::FinishError;
use crate::record::Record;
use crate::transport::Button;
use crate::value::Fields;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

// ============================================================================
// Flow type
// ============================================================================

/// Identifier of a dialog type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    /// Add a progress entry.
    AddEntry,
    /// Add a project.
    AddProject,
    /// Delete the entries of one day.
    DeleteEntry,
    /// Add a wishlist item.
    AddWishlistItem,
    /// Add a note.
    AddNote,
    /// Create a plan.
    AddPlan,
    /// Replace the photo of an existing project.
    ReplaceProjectPhoto,
}

impl FlowType {
    /// Every flow type.
    pub const ALL: [Self; 7] = [
        Self::AddEntry,
        Self::AddProject,
        Self::DeleteEntry,
        Self::AddWishlistItem,
        Self::AddNote,
        Self::AddPlan,
        Self::ReplaceProjectPhoto,
    ];

    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AddEntry => "add_entry",
            Self::AddProject => "add_project",
            Self::DeleteEntry => "delete_entry",
            Self::AddWishlistItem => "add_wishlist_item",
            Self::AddNote => "add_note",
            Self::AddPlan => "add_plan",
            Self::ReplaceProjectPhoto => "replace_project_photo",
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|flow| flow.as_str() == s)
            .ok_or_else(|| format!("unknown flow type: {s}"))
    }
}

// ============================================================================
// Steps
// ============================================================================

/// Kind of input a step expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Free text.
    Text,
    /// A number typed as text.
    Number,
    /// A date typed as text or picked with a button.
    Date,
    /// A photo.
    Photo,
    /// Only a button press.
    Choice,
}

impl InputKind {
    /// Whether typed text is an answer to a step of this kind.
    #[must_use]
    pub const fn accepts_text(self) -> bool {
        matches!(self, Self::Text | Self::Number | Self::Date)
    }
}

/// Dynamic content appended to a step's prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptHint {
    /// Up to five of the owner's known hashtags.
    KnownHashtags,
}

/// A button offered by a step, answering it as if `value` had been typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// The rendered button.
    pub button: Button,
    /// Text handed to the validator when the button is pressed.
    pub value: String,
}

impl Choice {
    /// Create a choice.
    pub fn new(label: impl Into<String>, token: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            button: Button::new(label, token),
            value: value.into(),
        }
    }
}

/// One question of a flow.
#[derive(Clone)]
pub struct StepDefinition {
    /// Field the answer is stored under.
    pub field: &'static str,
    /// Expected input kind.
    pub input: InputKind,
    /// Prompt text; `{field}` placeholders are filled from collected fields.
    pub prompt: String,
    /// Whether the step may be skipped.
    pub optional: bool,
    /// Button token that skips the step (only when optional).
    pub skip_token: Option<String>,
    /// Buttons answering the step.
    pub choices: Vec<Choice>,
    /// Dynamic prompt content.
    pub hint: Option<PromptHint>,
    /// Validator producing the stored value.
    pub validator: Arc<dyn StepValidator>,
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("field", &self.field)
            .field("input", &self.input)
            .field("optional", &self.optional)
            .field("skip_token", &self.skip_token)
            .finish_non_exhaustive()
    }
}

impl StepDefinition {
    /// Create a required step.
    pub fn new(
        field: &'static str,
        input: InputKind,
        prompt: impl Into<String>,
        validator: impl StepValidator + 'static,
    ) -> Self {
        Self {
            field,
            input,
            prompt: prompt.into(),
            optional: false,
            skip_token: None,
            choices: Vec::new(),
            hint: None,
            validator: Arc::new(validator),
        }
    }

    /// Make the step optional, skippable by text or by the `token` button.
    #[must_use]
    pub fn skippable(mut self, token: impl Into<String>) -> Self {
        self.optional = true;
        self.skip_token = Some(token.into());
        self
    }

    /// Offer a button answer.
    #[must_use]
    pub fn choice(mut self, choice: Choice) -> Self {
        self.choices.push(choice);
        self
    }

    /// Append dynamic content to the prompt.
    #[must_use]
    pub const fn hint(mut self, hint: PromptHint) -> Self {
        self.hint = Some(hint);
        self
    }

    /// Whether `token` is this step's skip button.
    #[must_use]
    pub fn is_skip_token(&self, token: &str) -> bool {
        self.optional && self.skip_token.as_deref() == Some(token)
    }

    /// The text equivalent of a choice button, if `token` belongs to this step.
    #[must_use]
    pub fn choice_value(&self, token: &str) -> Option<&str> {
        self.choices
            .iter()
            .find(|c| c.button.token == token)
            .map(|c| c.value.as_str())
    }

    /// Fill `{field}` placeholders with collected values.
    #[must_use]
    pub fn render_prompt(&self, fields: &Fields) -> String {
        let mut text = self.prompt.clone();
        for (name, value) in fields.iter() {
            let placeholder = format!("{{{name}}}");
            if text.contains(&placeholder) {
                let shown = value.map_or_else(|| "—".to_string(), ToString::to_string);
                text = text.replace(&placeholder, &shown);
            }
        }
        text
    }
}

/// Whether typed text is the skip affordance.
#[must_use]
pub fn is_skip_text(text: &str) -> bool {
    let text = text.trim();
    text.eq_ignore_ascii_case("skip") || text.to_lowercase() == "пропустить"
}

// ============================================================================
// Flows
// ============================================================================

/// Context handed to finishers.
#[derive(Debug, Clone, Copy)]
pub struct FinishContext {
    /// Owner of the dialog.
    pub owner: OwnerId,
    /// Current local time.
    pub now: NaiveDateTime,
}

/// Converts collected fields into a record.
pub type Finisher = fn(&Fields, &FinishContext) -> Result<Record, FinishError>;

/// A complete dialog type.
#[derive(Debug, Clone)]
pub struct FlowDefinition {
    /// Flow identifier.
    pub flow_type: FlowType,
    /// Heading shown above the first question.
    pub title: String,
    /// Ordered steps.
    pub steps: Vec<StepDefinition>,
    /// Record builder.
    pub finisher: Finisher,
    /// Whether post-commit hooks run after this flow completes.
    pub notify_hooks: bool,
    /// Fields the router must supply when starting the flow.
    pub seed_fields: Vec<&'static str>,
}

impl FlowDefinition {
    /// Create a flow definition.
    pub fn new(flow_type: FlowType, title: impl Into<String>, finisher: Finisher) -> Self {
        Self {
            flow_type,
            title: title.into(),
            steps: Vec::new(),
            finisher,
            notify_hooks: false,
            seed_fields: Vec::new(),
        }
    }

    /// Append a step.
    #[must_use]
    pub fn step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    /// Run post-commit hooks after completion.
    #[must_use]
    pub const fn notify_hooks(mut self) -> Self {
        self.notify_hooks = true;
        self
    }

    /// Require a seed field at start.
    #[must_use]
    pub fn seed(mut self, field: &'static str) -> Self {
        self.seed_fields.push(field);
        self
    }

    /// The step at `index`.
    #[must_use]
    pub fn step_at(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    /// Whether `index` is past the last step.
    #[must_use]
    pub fn is_complete(&self, index: usize) -> bool {
        index >= self.steps.len()
    }
}
