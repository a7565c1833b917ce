//! End-to-end tests for the conversation orchestration engine.
//!
//! Every scenario runs the full submit pipeline (registry, executor,
//! memory, emitter) against the mock gateway; nothing here talks to a real
//! model service.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use postsmith::adapters::{InMemoryDocumentReader, MockAIProvider};
use postsmith::application::handlers::{
    SessionContext, SubmitMessageCommand, SubmitMessageHandler,
};
use postsmith::domain::engine::{
    CachedPost, ConversationMemoryManager, FinalResponse, MemoryConfig, Platform, ResponseKind,
    SessionRegistry, SocialDraft, StageGraph, StageGraphExecutor, StreamEmitter, StreamEvent,
    SUMMARY_SENTINEL,
};
use postsmith::domain::foundation::{PostId, SessionId};

const INTENT_SOCIAL: &str =
    r#"{"intent": "social_content", "confidence": 0.95, "reasoning": "content request"}"#;
const INTENT_SUPPORT: &str =
    r#"{"intent": "support", "confidence": 0.9, "reasoning": "general question"}"#;

struct Harness {
    handler: SubmitMessageHandler,
    memory: Arc<ConversationMemoryManager>,
    registry: Arc<SessionRegistry>,
}

fn harness(provider: MockAIProvider) -> Harness {
    let provider = Arc::new(provider);
    let registry = Arc::new(SessionRegistry::new());
    let memory = Arc::new(ConversationMemoryManager::new(MemoryConfig::default()));
    let executor = Arc::new(StageGraphExecutor::new(StageGraph::standard(
        provider.clone(),
        0.7,
    )));
    let handler = SubmitMessageHandler::new(
        registry.clone(),
        memory.clone(),
        executor,
        provider,
        Arc::new(InMemoryDocumentReader::new()),
    );
    Harness {
        handler,
        memory,
        registry,
    }
}

async fn submit_and_collect(
    harness: &Harness,
    session_id: SessionId,
    message: &str,
    context: SessionContext,
) -> Vec<StreamEvent> {
    let (emitter, mut rx) = StreamEmitter::channel(session_id, 256);
    harness
        .handler
        .handle(
            SubmitMessageCommand::new(session_id, message, context),
            emitter,
        )
        .await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn terminal_of(events: &[StreamEvent]) -> &StreamEvent {
    events.last().expect("stream must carry events")
}

// ───────────────────────────────────────────────────────────────────────────
// At-most-one-active-per-session
// ───────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn newer_message_interrupts_running_execution() {
    // Slow gateway so execution A is still inside its first call when B
    // arrives for the same session.
    let provider = MockAIProvider::new()
        .with_default_response(INTENT_SUPPORT)
        .with_delay(Duration::from_millis(150));
    let h = Arc::new(harness(provider));
    let session_id = SessionId::new();

    let (emitter_a, mut rx_a) = StreamEmitter::channel(session_id, 256);
    let handler_a = h.clone();
    let task_a = tokio::spawn(async move {
        handler_a
            .handler
            .handle(
                SubmitMessageCommand::new(session_id, "message A", SessionContext::default()),
                emitter_a,
            )
            .await
    });

    tokio::time::sleep(Duration::from_millis(40)).await;

    let events_b =
        submit_and_collect(&h, session_id, "message B", SessionContext::default()).await;
    let outcome_a = task_a.await.unwrap();

    // A was superseded: its stream ends with `interrupted` and its outcome
    // is incomplete.
    assert!(!outcome_a.is_complete);
    let mut events_a = Vec::new();
    while let Ok(event) = rx_a.try_recv() {
        events_a.push(event);
    }
    assert!(matches!(events_a.first(), Some(StreamEvent::Start { .. })));
    assert!(matches!(
        terminal_of(&events_a),
        StreamEvent::Interrupted { .. }
    ));

    // B completed normally.
    assert!(matches!(terminal_of(&events_b), StreamEvent::End { .. }));

    // Only B's exchange was committed to memory.
    let (turns, _, count) = h.memory.load(session_id);
    assert_eq!(count, 1);
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].user_text, "message B");

    // The registry handle was released.
    assert!(!h.registry.is_active(session_id));
}

// ───────────────────────────────────────────────────────────────────────────
// Summarization trigger determinism
// ───────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn summarization_fires_exactly_on_threshold_multiples() {
    let memory = ConversationMemoryManager::new(MemoryConfig {
        window_size: 20,
        retained_after_summary: 8,
        summarize_threshold: 5,
    });
    let provider = MockAIProvider::new().with_default_response("compacted digest");
    let session_id = SessionId::new();

    for i in 1..=12u64 {
        memory
            .commit(session_id, &format!("message {i}"), "reply", None, &provider)
            .await;
        let expected_calls = (i / 5) as usize;
        assert_eq!(
            provider.call_count(),
            expected_calls,
            "after message {i} the gateway should have been asked {expected_calls} times"
        );
    }

    let (_, summary, count) = memory.load(session_id);
    assert_eq!(count, 12);
    // The summary after crossing the threshold differs from the
    // pre-summary sentinel.
    assert_eq!(summary.as_deref(), Some("compacted digest"));
    assert_ne!(summary.as_deref(), Some(SUMMARY_SENTINEL));
}

proptest! {
    #[test]
    fn trigger_rule_matches_the_contract(n in 0u64..10_000) {
        let memory = ConversationMemoryManager::new(MemoryConfig {
            window_size: 20,
            retained_after_summary: 8,
            summarize_threshold: 5,
        });
        prop_assert_eq!(memory.should_summarize(n), n >= 5 && n % 5 == 0);
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Platform clarification conservatism
// ───────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stylistic_cue_yields_platform_clarification() {
    // The platform stub guesses confidently; the engine must still ask.
    let provider = MockAIProvider::new()
        .with_response(INTENT_SOCIAL)
        .with_response(r#"{"platform": "twitter", "confidence": 0.99, "reasoning": "punchy"}"#);
    let h = harness(provider);
    let session_id = SessionId::new();

    let events = submit_and_collect(
        &h,
        session_id,
        "make it more engaging",
        SessionContext::default(),
    )
    .await;

    match terminal_of(&events) {
        StreamEvent::End {
            response_kind,
            response,
            ..
        } => {
            assert_eq!(*response_kind, ResponseKind::Answer);
            match response {
                FinalResponse::Answer { text, suggested_options } => {
                    assert!(text.to_lowercase().contains("platform"));
                    assert!(!suggested_options.is_empty());
                }
                other => panic!("expected clarification answer, got {other:?}"),
            }
        }
        other => panic!("expected end event, got {other:?}"),
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Separation invariant
// ───────────────────────────────────────────────────────────────────────────

#[test]
fn conformance_check_rejects_inline_code() {
    let draft = SocialDraft::text("Quick tip!\n```python\nprint('hi')\n```\nEnjoy.");
    assert!(draft.check_separation(false).is_err());
    // An explicit inline request makes the same draft valid.
    assert!(draft.check_separation(true).is_ok());
}

#[tokio::test]
async fn generated_drafts_keep_code_out_of_main_text() {
    let provider = MockAIProvider::new()
        .with_response(INTENT_SOCIAL)
        .with_response(r#"{"platform": "twitter", "confidence": 0.9, "reasoning": "named"}"#)
        .with_response(
            r#"{"main_text": "New release!\n```rust\nfn main() {}\n```", "code_examples": [], "visual_elements": []}"#,
        );
    let h = harness(provider);

    let events = submit_and_collect(
        &h,
        SessionId::new(),
        "Write a twitter post about our rust release",
        SessionContext::default(),
    )
    .await;

    match terminal_of(&events) {
        StreamEvent::End { response, .. } => match response {
            FinalResponse::SocialPost { draft, .. } => {
                assert!(draft.check_separation(false).is_ok());
                assert!(!draft.main_text.contains("```"));
                assert_eq!(draft.code_examples.len(), 1);
            }
            other => panic!("expected social post, got {other:?}"),
        },
        other => panic!("expected end event, got {other:?}"),
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Fallback on gateway failure
// ───────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn total_gateway_outage_still_ends_normally() {
    let provider = MockAIProvider::new().always_failing();
    let h = harness(provider);

    let events = submit_and_collect(
        &h,
        SessionId::new(),
        "Tell me about rust",
        SessionContext::default(),
    )
    .await;

    // Exactly one terminal event, and it is `end`, not `error`: generation
    // failures are recoverable.
    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1);
    match terminal_of(&events) {
        StreamEvent::End { response, .. } => {
            assert!(!response.content_text().is_empty());
            assert!(!response.suggested_options().is_empty());
        }
        other => panic!("expected end event, got {other:?}"),
    }
}

// ───────────────────────────────────────────────────────────────────────────
// End-to-end social scenario
// ───────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn linkedin_request_produces_structured_draft() {
    let provider = MockAIProvider::new()
        .with_response(INTENT_SOCIAL)
        .with_response(r#"{"platform": "linkedin", "confidence": 0.93, "reasoning": "named"}"#)
        .with_response(
            r#"{"main_text": "Remote work tip: guard two focus hours daily.", "code_examples": [], "visual_elements": ["calendar screenshot"]}"#,
        );
    let h = harness(provider);
    let session_id = SessionId::new();

    let (emitter, mut rx) = StreamEmitter::channel(session_id, 256);
    let outcome = h
        .handler
        .handle(
            SubmitMessageCommand::new(
                session_id,
                "Create a LinkedIn post about remote work tips",
                SessionContext::default(),
            ),
            emitter,
        )
        .await;

    assert!(outcome.is_complete);
    assert!(outcome.is_social_post);
    assert_eq!(outcome.platform, Some(Platform::LinkedIn));
    let draft = outcome.structured_draft.unwrap();
    assert!(!draft.main_text.is_empty());
    assert!(draft.code_examples.is_empty());

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(matches!(events.first(), Some(StreamEvent::Start { .. })));
    match terminal_of(&events) {
        StreamEvent::End { response_kind, .. } => {
            assert_eq!(*response_kind, ResponseKind::SocialPost);
        }
        other => panic!("expected end event, got {other:?}"),
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Edit ambiguity scenario
// ───────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ambiguous_edit_lists_candidate_previews() {
    let provider = MockAIProvider::new()
        .with_response(INTENT_SOCIAL)
        .with_response(r#"{"platform": null, "confidence": 0.2, "reasoning": "no mention"}"#)
        .with_response(r#"{"action": "edit", "selected_post_id": null}"#);
    let h = harness(provider);

    let context = SessionContext {
        cached_posts: vec![
            CachedPost {
                id: PostId::new(),
                platform: Platform::Twitter,
                draft: SocialDraft::text("Ship small, ship often."),
            },
            CachedPost {
                id: PostId::new(),
                platform: Platform::LinkedIn,
                draft: SocialDraft::text("We are hiring Rust engineers."),
            },
        ],
        ..SessionContext::default()
    };

    let events = submit_and_collect(&h, SessionId::new(), "edit the post", context).await;

    match terminal_of(&events) {
        StreamEvent::End {
            response_kind,
            response,
            ..
        } => {
            // No post id was guessed; the user gets a clarification
            // listing a preview of each candidate.
            assert_eq!(*response_kind, ResponseKind::Answer);
            match response {
                FinalResponse::Answer { text, suggested_options } => {
                    assert!(text.contains("[twitter]"));
                    assert!(text.contains("[linkedin]"));
                    assert!(text.contains("Ship small"));
                    assert!(text.contains("hiring Rust"));
                    assert_eq!(suggested_options.len(), 2);
                }
                other => panic!("expected clarification answer, got {other:?}"),
            }
        }
        other => panic!("expected end event, got {other:?}"),
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Streaming contract
// ───────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_starts_first_and_terminates_once() {
    let provider = MockAIProvider::new()
        .with_response(INTENT_SUPPORT)
        .with_response("Rust is a systems programming language focused on safety.");
    let h = harness(provider);

    let events = submit_and_collect(
        &h,
        SessionId::new(),
        "What is Rust?",
        SessionContext::default(),
    )
    .await;

    assert!(matches!(events.first(), Some(StreamEvent::Start { .. })));
    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1);
    assert!(events.last().unwrap().is_terminal());

    // The streamed answer arrived as content deltas before the end event.
    let content_events = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Content { .. }))
        .count();
    assert!(content_events > 0);
}
