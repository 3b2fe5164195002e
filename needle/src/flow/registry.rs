//! Flow registry with an explicit interpreter priority.

use super::{FlowDefinition, FlowType, catalog};
use crate::error::{EngineError, EngineResult};
use crate::session::Session;
use std::collections::HashMap;
use std::sync::Arc;

/// Declared order of the flow interpreters.
///
/// Plans come ahead of entries, which precede the remaining flows. An owner
/// has at most one session, so at most one interpreter ever matches an event
/// and this order never changes which flow handles it.
pub const DEFAULT_PRIORITY: [FlowType; 7] = [
    FlowType::AddPlan,
    FlowType::AddEntry,
    FlowType::AddProject,
    FlowType::ReplaceProjectPhoto,
    FlowType::DeleteEntry,
    FlowType::AddWishlistItem,
    FlowType::AddNote,
];

/// Registered flow definitions plus the priority order among them.
#[derive(Debug, Clone)]
pub struct FlowRegistry {
    definitions: HashMap<FlowType, Arc<FlowDefinition>>,
    priority: Vec<FlowType>,
}

impl Default for FlowRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl FlowRegistry {
    /// An empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            definitions: HashMap::new(),
            priority: Vec::new(),
        }
    }

    /// Registry with every built-in flow and [`DEFAULT_PRIORITY`].
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for definition in catalog::standard() {
            registry.register(definition);
        }
        registry.priority = DEFAULT_PRIORITY.to_vec();
        registry
    }

    /// Register (or replace) a definition. New flow types go last in priority.
    pub fn register(&mut self, definition: FlowDefinition) {
        let flow = definition.flow_type;
        if self.definitions.insert(flow, Arc::new(definition)).is_none() {
            self.priority.push(flow);
        }
    }

    /// Replace the priority order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Registry`] unless `order` names every registered
    /// flow exactly once.
    pub fn with_priority(mut self, order: Vec<FlowType>) -> EngineResult<Self> {
        for (i, flow) in order.iter().enumerate() {
            if !self.definitions.contains_key(flow) {
                return Err(EngineError::Registry(format!("{flow} is not registered")));
            }
            if order[..i].contains(flow) {
                return Err(EngineError::Registry(format!("{flow} is listed twice")));
            }
        }
        if let Some(missing) = self.priority.iter().find(|f| !order.contains(f)) {
            return Err(EngineError::Registry(format!(
                "{missing} is missing from the priority list"
            )));
        }
        self.priority = order;
        Ok(self)
    }

    /// The definition of `flow`.
    #[must_use]
    pub fn get(&self, flow: FlowType) -> Option<Arc<FlowDefinition>> {
        self.definitions.get(&flow).cloned()
    }

    /// Flows in interpreter priority order.
    #[must_use]
    pub fn priority(&self) -> &[FlowType] {
        &self.priority
    }

    /// The interpreter of `session`'s flow. Only that flow can consume
    /// events for the session, whatever the priority order.
    #[must_use]
    pub fn interpreter_for(&self, session: &Session) -> Option<Arc<FlowDefinition>> {
        self.get(session.flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_standard_priority_puts_plans_before_entries() {
        let registry = FlowRegistry::standard();
        let priority = registry.priority();
        assert_eq!(priority.len(), FlowType::ALL.len());
        assert_eq!(priority[0], FlowType::AddPlan);
        assert_eq!(priority[1], FlowType::AddEntry);
    }

    #[test]
    fn test_with_priority_validates_order() {
        let mut order = DEFAULT_PRIORITY.to_vec();
        order.reverse();
        let registry = FlowRegistry::standard().with_priority(order.clone()).unwrap();
        assert_eq!(registry.priority(), order.as_slice());

        let err = FlowRegistry::standard()
            .with_priority(vec![FlowType::AddEntry])
            .unwrap_err();
        assert!(err.to_string().contains("missing"));

        let mut dup = DEFAULT_PRIORITY.to_vec();
        dup.push(FlowType::AddNote);
        let err = FlowRegistry::standard().with_priority(dup).unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn test_interpreter_for_session() {
        let registry = FlowRegistry::standard();
        let now = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let session = Session::new(1, FlowType::AddNote, now);
        let def = registry.interpreter_for(&session).unwrap();
        assert_eq!(def.flow_type, FlowType::AddNote);

        assert!(FlowRegistry::empty().interpreter_for(&session).is_none());
    }

    #[test]
    fn test_priority_does_not_change_the_session_interpreter() {
        let now = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut reversed = DEFAULT_PRIORITY.to_vec();
        reversed.reverse();
        let reordered = FlowRegistry::standard().with_priority(reversed).unwrap();
        let standard = FlowRegistry::standard();

        for flow in FlowType::ALL {
            let session = Session::new(1, flow, now);
            assert_eq!(standard.interpreter_for(&session).unwrap().flow_type, flow);
            assert_eq!(reordered.interpreter_for(&session).unwrap().flow_type, flow);
        }
    }
}
