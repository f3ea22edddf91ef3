//! Stage names and the transition table

use std::fmt;

use serde::{Deserialize, Serialize};

use super::WorkflowState;

/// One node of the workflow graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    ScopeDiscussion,
    SchemaSelection,
    SimilaritySearch,
    SpecGeneration,
    SpecDiscussion,
}

/// What the engine does after a stage returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Next(Stage),
    End,
}

impl Stage {
    /// Entry point of every run
    pub const INITIAL: Stage = Stage::ScopeDiscussion;

    /// Next step after this stage has run on `state`
    ///
    /// Reads only scope emptiness, committed spec emptiness and the
    /// completion flag.
    pub fn next(self, state: &WorkflowState) -> Transition {
        self.successor(state.has_scope(), state.has_committed_spec(), state.is_complete)
    }

    /// Transition table
    pub fn successor(self, scope_set: bool, spec_committed: bool, complete: bool) -> Transition {
        match self {
            Stage::ScopeDiscussion if scope_set => Transition::Next(Stage::SchemaSelection),
            Stage::ScopeDiscussion => Transition::Next(Stage::ScopeDiscussion),
            Stage::SchemaSelection => Transition::Next(Stage::SimilaritySearch),
            Stage::SimilaritySearch => Transition::Next(Stage::SpecGeneration),
            Stage::SpecGeneration if spec_committed => Transition::Next(Stage::SpecDiscussion),
            Stage::SpecGeneration => Transition::Next(Stage::SpecGeneration),
            Stage::SpecDiscussion if complete => Transition::End,
            Stage::SpecDiscussion => Transition::Next(Stage::SpecDiscussion),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::ScopeDiscussion => "scope-discussion",
            Stage::SchemaSelection => "schema-selection",
            Stage::SimilaritySearch => "similarity-search",
            Stage::SpecGeneration => "spec-generation",
            Stage::SpecDiscussion => "spec-discussion",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;
    use crate::workflow::Scope;
    use proptest::prelude::*;
    use serde_json::json;

    const ALL: [Stage; 5] = [
        Stage::ScopeDiscussion,
        Stage::SchemaSelection,
        Stage::SimilaritySearch,
        Stage::SpecGeneration,
        Stage::SpecDiscussion,
    ];

    fn state_with(scope_set: bool, spec_committed: bool, complete: bool, chatter: &[String]) -> WorkflowState {
        let mut state = WorkflowState::default();
        for (i, text) in chatter.iter().enumerate() {
            let msg = if i % 2 == 0 {
                Message::user(text.clone())
            } else {
                Message::assistant(text.clone())
            };
            state.scope_conversation.push(msg.clone());
            state.draft_conversation.push(msg.clone());
            state.review_conversation.push(msg);
        }
        if scope_set {
            state.scope = Some(Scope {
                description: "Mobile app mockups".to_string(),
                challenge_type: "design".to_string(),
            });
        }
        if spec_committed {
            state.committed_spec.insert("title".to_string(), json!("Campus Eats"));
        }
        state.is_complete = complete;
        state
    }

    #[test]
    fn test_happy_path_order() {
        let mut state = state_with(false, false, false, &[]);
        assert_eq!(Stage::INITIAL.next(&state), Transition::Next(Stage::ScopeDiscussion));

        state = state_with(true, false, false, &[]);
        assert_eq!(Stage::ScopeDiscussion.next(&state), Transition::Next(Stage::SchemaSelection));
        assert_eq!(Stage::SchemaSelection.next(&state), Transition::Next(Stage::SimilaritySearch));
        assert_eq!(Stage::SimilaritySearch.next(&state), Transition::Next(Stage::SpecGeneration));
        assert_eq!(Stage::SpecGeneration.next(&state), Transition::Next(Stage::SpecGeneration));

        state = state_with(true, true, false, &[]);
        assert_eq!(Stage::SpecGeneration.next(&state), Transition::Next(Stage::SpecDiscussion));
        assert_eq!(Stage::SpecDiscussion.next(&state), Transition::Next(Stage::SpecDiscussion));

        state = state_with(true, true, true, &[]);
        assert_eq!(Stage::SpecDiscussion.next(&state), Transition::End);
    }

    #[test]
    fn test_empty_scope_mapping_loops() {
        let state = WorkflowState {
            scope: Some(Scope::default()),
            ..WorkflowState::default()
        };
        assert_eq!(Stage::ScopeDiscussion.next(&state), Transition::Next(Stage::ScopeDiscussion));
    }

    proptest! {
        #[test]
        fn transition_ignores_conversation_content(
            stage_idx in 0usize..5,
            scope_set: bool,
            spec_committed: bool,
            complete: bool,
            a in prop::collection::vec(".{0,40}", 0..8),
            b in prop::collection::vec(".{0,40}", 0..8),
        ) {
            let stage = ALL[stage_idx];
            let left = state_with(scope_set, spec_committed, complete, &a);
            let right = state_with(scope_set, spec_committed, complete, &b);

            prop_assert_eq!(stage.next(&left), stage.next(&right));
            prop_assert_eq!(stage.next(&left), stage.successor(scope_set, spec_committed, complete));
        }
    }
}
