//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::transition::*;
use super::*;
use crate::llm::{LlmError, Usage};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

const MODELS: [&str; 2] = ["tinyllama", "llama3"];

fn test_context() -> ChatContext {
    ChatContext::new("test-session", MODELS.iter().map(ToString::to_string).collect())
}

/// Apply the context-changing effects the way the runtime does
fn apply_to_context(context: &mut ChatContext, effects: &[Effect]) {
    for effect in effects {
        match effect {
            Effect::StartTurn { turn, .. } => context.last_turn = *turn,
            Effect::ReplaceCatalog { models } => context.models.clone_from(models),
            _ => {}
        }
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_model() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("tinyllama".to_string()),
        Just("llama3".to_string()),
        Just("missing".to_string()),
    ]
}

fn arb_turn() -> impl Strategy<Value = TurnId> {
    (0u64..6).prop_map(TurnId)
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        ("[a-zA-Z ]{0,20}", arb_model())
            .prop_map(|(prompt, model_id)| Event::UserSubmit { prompt, model_id }),
        Just(Event::Reset),
        arb_model().prop_map(|model_id| Event::SelectModel { model_id }),
        proptest::collection::vec(arb_model(), 0..3)
            .prop_map(|models| Event::CatalogRefreshed { models }),
        (arb_turn(), "[a-z ]{0,8}").prop_map(|(turn, text)| Event::StreamDelta { turn, text }),
        arb_turn().prop_map(|turn| Event::StreamCompleted {
            turn,
            usage: Usage::default()
        }),
        arb_turn().prop_map(|turn| Event::StreamFailed {
            turn,
            error: LlmError::network("reset by peer")
        }),
    ]
}

fn arb_running_state() -> impl Strategy<Value = TurnState> {
    (1u64..6, arb_model()).prop_map(|(turn, model_id)| TurnState::Running {
        turn: TurnId(turn),
        model_id,
    })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    // Invariant 1: a turn starts only from Idle, and every exit from Running commits
    #[test]
    fn prop_running_entered_and_left_with_matching_effects(
        events in proptest::collection::vec(arb_event(), 0..40)
    ) {
        let mut state = TurnState::Idle;
        let mut ctx = test_context();

        for event in events {
            let Ok(result) = transition(&state, &ctx, event) else { continue };

            let starts = result.effects.iter().filter(|e| matches!(e, Effect::StartTurn { .. })).count();
            let commits = result.effects.iter().filter(|e| matches!(e, Effect::CommitReply { .. })).count();

            match (&state, &result.new_state) {
                (TurnState::Idle, TurnState::Running { .. }) => {
                    prop_assert_eq!(starts, 1);
                    prop_assert_eq!(commits, 0);
                }
                (TurnState::Running { .. }, TurnState::Idle) => {
                    prop_assert_eq!(starts, 0);
                    prop_assert_eq!(commits, 1);
                }
                _ => {
                    prop_assert_eq!(starts, 0);
                    prop_assert_eq!(commits, 0);
                }
            }

            apply_to_context(&mut ctx, &result.effects);
            state = result.new_state;
        }
    }

    // Invariant 2: turn ids handed out are strictly increasing
    #[test]
    fn prop_turn_ids_increase(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = TurnState::Idle;
        let mut ctx = test_context();
        let mut last = TurnId(0);

        for event in events {
            let Ok(result) = transition(&state, &ctx, event) else { continue };
            for effect in &result.effects {
                if let Effect::StartTurn { turn, .. } = effect {
                    prop_assert!(*turn > last);
                    last = *turn;
                }
            }
            apply_to_context(&mut ctx, &result.effects);
            state = result.new_state;
        }
    }

    // Invariant 3: submit while running is always rejected with no effects
    #[test]
    fn prop_submit_while_running_rejected(
        state in arb_running_state(),
        prompt in "[a-zA-Z ]{0,20}",
        model_id in arb_model(),
    ) {
        let result = transition(&state, &test_context(), Event::UserSubmit { prompt, model_id });
        prop_assert_eq!(result.unwrap_err(), TransitionError::AlreadyRunning);
    }

    // Invariant 4: reset while running is always rejected
    #[test]
    fn prop_reset_while_running_rejected(state in arb_running_state()) {
        let result = transition(&state, &test_context(), Event::Reset);
        prop_assert_eq!(result.unwrap_err(), TransitionError::ResetWhileRunning);
    }

    // Invariant 5: stream events never move an idle session
    #[test]
    fn prop_idle_ignores_stream_events(turn in arb_turn(), text in "[a-z]{0,5}") {
        let ctx = test_context();
        for event in [
            Event::StreamDelta { turn, text: text.clone() },
            Event::StreamCompleted { turn, usage: Usage::default() },
            Event::StreamFailed { turn, error: LlmError::unknown("x") },
        ] {
            let is_stale = matches!(
                transition(&TurnState::Idle, &ctx, event),
                Err(TransitionError::StaleTurn { expected: None, .. })
            );
            prop_assert!(is_stale);
        }
    }

    // Invariant 6: an empty catalog blocks every submission
    #[test]
    fn prop_empty_catalog_blocks_submit(prompt in "[a-zA-Z ]{0,20}", model_id in arb_model()) {
        let ctx = ChatContext::new("s", vec![]);
        let result = transition(&TurnState::Idle, &ctx, Event::UserSubmit { prompt, model_id });
        prop_assert_eq!(result.unwrap_err(), TransitionError::NoModelsAvailable);
    }
}
