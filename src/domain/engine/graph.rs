//! Static stage graph.
//!
//! The graph is a declarative table of `(stage, edge)` tuples built once at
//! startup. Edges are either terminal or routed through a pure function of
//! the session state, so the branch points are exhaustively matchable and
//! testable without any gateway in the loop.

use std::collections::HashMap;
use std::sync::Arc;

use super::errors::EngineError;
use super::intent::Intent;
use super::stages::{
    IntentClassifierStage, PlatformClarificationStage, PlatformClassifierStage, PostCreatorStage,
    PostEditorStage, PostSelectorStage, QuestionAnswerStage, Stage,
};
use super::state::SessionState;
use crate::ports::AIProvider;

/// Node identifiers of the stage graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKey {
    IntentClassifier,
    PlatformClassifier,
    PlatformClarification,
    PostSelector,
    PostCreator,
    PostEditor,
    QuestionAnswer,
}

/// Outgoing edge of a stage.
pub enum Edge {
    /// The stage produces the terminal result; the graph ends here.
    Terminal,
    /// A pure function of the state picks the next stage.
    Router(fn(&SessionState) -> Result<StageKey, EngineError>),
}

/// Intent router: social content goes to platform detection, everything
/// else is answered directly.
fn route_after_intent(state: &SessionState) -> Result<StageKey, EngineError> {
    let decision = state
        .intent
        .as_ref()
        .ok_or(EngineError::MissingStageOutput("intent"))?;
    Ok(match decision.intent {
        Intent::SocialContent => StageKey::PlatformClassifier,
        Intent::Support | Intent::DocumentQuestion => StageKey::QuestionAnswer,
    })
}

/// Platform router: sessions holding cached drafts go through the selector
/// (which can resolve an edit target, or clarify by listing the drafts,
/// without a platform in hand); otherwise ambiguity resolves to asking the
/// user and a known platform goes straight to the creator.
fn route_after_platform(state: &SessionState) -> Result<StageKey, EngineError> {
    let decision = state
        .platform_decision
        .as_ref()
        .ok_or(EngineError::MissingStageOutput("platform_decision"))?;
    Ok(if !state.cached_posts.is_empty() {
        StageKey::PostSelector
    } else if decision.needs_clarification {
        StageKey::PlatformClarification
    } else {
        StageKey::PostCreator
    })
}

/// Selector router: a resolved target is edited; creating a fresh draft
/// still requires a resolved platform. (The selector terminates the graph
/// itself when the edit target is ambiguous.)
fn route_after_selector(state: &SessionState) -> Result<StageKey, EngineError> {
    if state.edit_target.is_some() {
        return Ok(StageKey::PostEditor);
    }
    let decision = state
        .platform_decision
        .as_ref()
        .ok_or(EngineError::MissingStageOutput("platform_decision"))?;
    Ok(if decision.needs_clarification {
        StageKey::PlatformClarification
    } else {
        StageKey::PostCreator
    })
}

/// The stage graph: registered stages plus their edge table.
pub struct StageGraph {
    stages: HashMap<StageKey, Arc<dyn Stage>>,
    edges: HashMap<StageKey, Edge>,
    entry: StageKey,
}

impl StageGraph {
    /// Builds the standard conversation graph around one gateway.
    pub fn standard(provider: Arc<dyn AIProvider>, confidence_floor: f32) -> Self {
        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(IntentClassifierStage::new(provider.clone(), confidence_floor)),
            Arc::new(PlatformClassifierStage::new(
                provider.clone(),
                confidence_floor,
            )),
            Arc::new(PlatformClarificationStage::new()),
            Arc::new(PostSelectorStage::new(provider.clone())),
            Arc::new(PostCreatorStage::new(provider.clone())),
            Arc::new(PostEditorStage::new(provider.clone())),
            Arc::new(QuestionAnswerStage::new(provider)),
        ];

        let edges = [
            (StageKey::IntentClassifier, Edge::Router(route_after_intent)),
            (
                StageKey::PlatformClassifier,
                Edge::Router(route_after_platform),
            ),
            (StageKey::PlatformClarification, Edge::Terminal),
            (StageKey::PostSelector, Edge::Router(route_after_selector)),
            (StageKey::PostCreator, Edge::Terminal),
            (StageKey::PostEditor, Edge::Terminal),
            (StageKey::QuestionAnswer, Edge::Terminal),
        ];

        Self {
            stages: stages.into_iter().map(|s| (s.key(), s)).collect(),
            edges: edges.into_iter().collect(),
            entry: StageKey::IntentClassifier,
        }
    }

    /// The graph's entry stage.
    pub fn entry(&self) -> StageKey {
        self.entry
    }

    /// Looks up a registered stage.
    pub fn stage(&self, key: StageKey) -> Result<&Arc<dyn Stage>, EngineError> {
        self.stages.get(&key).ok_or(EngineError::UnknownStage(key))
    }

    /// Resolves the next stage after `key`, or `None` at a terminal edge.
    pub fn next(
        &self,
        key: StageKey,
        state: &SessionState,
    ) -> Result<Option<StageKey>, EngineError> {
        match self.edges.get(&key) {
            Some(Edge::Terminal) | None => Ok(None),
            Some(Edge::Router(router)) => {
                let target = router(state)?;
                // A routed-to stage must exist; surface graph defects early.
                self.stage(target)?;
                Ok(Some(target))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockAIProvider;
    use crate::domain::engine::intent::IntentDecision;
    use crate::domain::engine::platform::{Platform, PlatformDecision};
    use crate::domain::engine::state::{CachedPost, SocialDraft};
    use crate::domain::foundation::{PostId, SessionId};

    fn graph() -> StageGraph {
        StageGraph::standard(Arc::new(MockAIProvider::new()), 0.7)
    }

    fn state() -> SessionState {
        SessionState::new(SessionId::new(), "hello")
    }

    #[test]
    fn entry_is_intent_classifier() {
        assert_eq!(graph().entry(), StageKey::IntentClassifier);
    }

    #[test]
    fn all_registered_stages_resolve() {
        let graph = graph();
        for key in [
            StageKey::IntentClassifier,
            StageKey::PlatformClassifier,
            StageKey::PlatformClarification,
            StageKey::PostSelector,
            StageKey::PostCreator,
            StageKey::PostEditor,
            StageKey::QuestionAnswer,
        ] {
            assert!(graph.stage(key).is_ok(), "{key:?} missing");
        }
    }

    #[test]
    fn intent_router_splits_social_from_questions() {
        let graph = graph();
        let mut state = state();

        state.intent = Some(IntentDecision::new(Intent::SocialContent, 0.9, ""));
        assert_eq!(
            graph.next(StageKey::IntentClassifier, &state).unwrap(),
            Some(StageKey::PlatformClassifier)
        );

        state.intent = Some(IntentDecision::new(Intent::Support, 0.9, ""));
        assert_eq!(
            graph.next(StageKey::IntentClassifier, &state).unwrap(),
            Some(StageKey::QuestionAnswer)
        );

        state.intent = Some(IntentDecision::new(Intent::DocumentQuestion, 0.9, ""));
        assert_eq!(
            graph.next(StageKey::IntentClassifier, &state).unwrap(),
            Some(StageKey::QuestionAnswer)
        );
    }

    #[test]
    fn intent_router_requires_classifier_output() {
        let result = graph().next(StageKey::IntentClassifier, &state());
        assert!(matches!(result, Err(EngineError::MissingStageOutput(_))));
    }

    #[test]
    fn platform_router_honors_clarification_flag() {
        let graph = graph();
        let mut state = state();

        state.platform_decision = Some(PlatformDecision::clarify("no mention"));
        assert_eq!(
            graph.next(StageKey::PlatformClassifier, &state).unwrap(),
            Some(StageKey::PlatformClarification)
        );

        state.platform_decision = Some(PlatformDecision::explicit(Platform::Twitter, 0.9, ""));
        assert_eq!(
            graph.next(StageKey::PlatformClassifier, &state).unwrap(),
            Some(StageKey::PostCreator)
        );
    }

    #[test]
    fn platform_router_sends_cached_sessions_through_selector() {
        let graph = graph();
        let mut state = state().with_cached_posts(vec![CachedPost {
            id: PostId::new(),
            platform: Platform::Twitter,
            draft: SocialDraft::text("old tweet"),
        }]);

        // With drafts on hand, the selector runs whether or not the
        // platform resolved.
        state.platform_decision = Some(PlatformDecision::explicit(Platform::Twitter, 0.9, ""));
        assert_eq!(
            graph.next(StageKey::PlatformClassifier, &state).unwrap(),
            Some(StageKey::PostSelector)
        );

        state.platform_decision = Some(PlatformDecision::clarify("no mention"));
        assert_eq!(
            graph.next(StageKey::PlatformClassifier, &state).unwrap(),
            Some(StageKey::PostSelector)
        );
    }

    #[test]
    fn selector_router_picks_editor_for_resolved_target() {
        let graph = graph();
        let mut state = state();
        state.platform_decision = Some(PlatformDecision::explicit(Platform::Twitter, 0.9, ""));

        assert_eq!(
            graph.next(StageKey::PostSelector, &state).unwrap(),
            Some(StageKey::PostCreator)
        );

        state.edit_target = Some(PostId::new());
        assert_eq!(
            graph.next(StageKey::PostSelector, &state).unwrap(),
            Some(StageKey::PostEditor)
        );
    }

    #[test]
    fn selector_router_clarifies_platform_for_new_drafts() {
        let graph = graph();
        let mut state = state();
        state.platform_decision = Some(PlatformDecision::clarify("no mention"));

        assert_eq!(
            graph.next(StageKey::PostSelector, &state).unwrap(),
            Some(StageKey::PlatformClarification)
        );
    }

    #[test]
    fn terminal_stages_have_no_successor() {
        let graph = graph();
        let state = state();
        for key in [
            StageKey::PlatformClarification,
            StageKey::PostCreator,
            StageKey::PostEditor,
            StageKey::QuestionAnswer,
        ] {
            assert_eq!(graph.next(key, &state).unwrap(), None, "{key:?}");
        }
    }
}
