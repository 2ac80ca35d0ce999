//! Property-based tests for the runtime
//!
//! These verify ordering and round-trip invariants across arbitrary stacks,
//! prompt lists, and command layouts.

use super::commands;
use super::escalation::{self, EscalationKind, EscalationOutcome};
use crate::handlers::ChatPolicy;
use crate::program::{
    Command, CommandAction, CommandEvent, EscalationPolicy, GlobalPrompts, Platform, VersionModel,
};
use crate::request::Request;
use crate::state::{ConversationState, Frame, FrameStack, SessionStorage, VariableStore};
use proptest::prelude::*;

// ============================================================================
// Generators
// ============================================================================

fn arb_frame() -> impl Strategy<Value = Frame> {
    ("[a-z]{1,8}", "[a-z0-9]{1,8}", any::<bool>()).prop_map(|(program, node, finished)| {
        let mut frame = Frame::new(program, node);
        if finished {
            frame.node_id = None;
        }
        frame
    })
}

fn arb_stack() -> impl Strategy<Value = FrameStack> {
    proptest::collection::vec(arb_frame(), 1..6).prop_map(|frames| {
        let mut stack = FrameStack::default();
        for frame in frames {
            stack.push(frame);
        }
        stack
    })
}

fn arb_prompts() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-z ]{1,12}", 1..5)
}

fn empty_model() -> VersionModel {
    VersionModel {
        intents: vec![],
        entities: vec![],
        locale: "en-US".into(),
        platform: Platform::Chat,
        global_prompts: GlobalPrompts::default(),
    }
}

fn jump_command(event_name: &str, target: &str) -> Command {
    Command::new(
        CommandEvent::Intent {
            name: event_name.to_string(),
            entity_mappings: vec![],
            program_scope: None,
        },
        CommandAction::Jump {
            node_id: target.to_string(),
            program_id: None,
        },
    )
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Pushing then popping a frame restores the previous top exactly.
    #[test]
    fn prop_push_pop_restores_top(mut stack in arb_stack(), frame in arb_frame()) {
        let before = stack.top().cloned();
        let depth = stack.depth();

        stack.push(frame.clone());
        prop_assert_eq!(stack.depth(), depth + 1);
        prop_assert_eq!(stack.top(), Some(&frame));

        stack.pop();
        prop_assert_eq!(stack.depth(), depth);
        prop_assert_eq!(stack.top().cloned(), before);
    }

    /// The conversation state round-trips through JSON verbatim.
    #[test]
    fn prop_state_serde_round_trip(
        stack in arb_stack(),
        vars in proptest::collection::hash_map("[a-z]{1,6}", "[a-z0-9]{0,10}", 0..5),
    ) {
        let mut variables = VariableStore::new();
        for (name, value) in vars {
            variables.set(name, value);
        }
        let state = ConversationState {
            stack,
            variables,
            storage: SessionStorage::new(),
        };

        let json = serde_json::to_string(&state).unwrap();
        let back: ConversationState = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(state, back);
    }

    /// Non-randomized escalation yields the prompts in authored order, then
    /// exhausts exactly once, with the counter cleared afterwards.
    #[test]
    fn prop_escalation_prompt_order(prompts in arb_prompts()) {
        let model = empty_model();
        let mut storage = SessionStorage::new();
        let policy = EscalationPolicy {
            prompts: prompts.clone(),
            randomize: false,
            give_up: None,
        };

        for expected in &prompts {
            let outcome = escalation::consume(
                EscalationKind::NoMatch,
                Some(&policy),
                &model,
                &mut storage,
            );
            prop_assert_eq!(
                outcome,
                EscalationOutcome::Reprompt { prompt: expected.clone() }
            );
        }

        let outcome = escalation::consume(
            EscalationKind::NoMatch,
            Some(&policy),
            &model,
            &mut storage,
        );
        prop_assert!(
            matches!(outcome, EscalationOutcome::Exhausted { .. }),
            "expected Exhausted outcome"
        );

        // The counter was cleared, so the sequence starts over.
        let outcome = escalation::consume(
            EscalationKind::NoMatch,
            Some(&policy),
            &model,
            &mut storage,
        );
        prop_assert_eq!(
            outcome,
            EscalationOutcome::Reprompt { prompt: prompts[0].clone() }
        );
    }

    /// Command search prefers inner frames, and declaration order within a
    /// frame, regardless of how many other matching commands exist.
    #[test]
    fn prop_command_search_order(
        layout in proptest::collection::vec(
            proptest::collection::vec(any::<bool>(), 0..4),
            1..5,
        ),
    ) {
        let mut stack = FrameStack::default();
        for (frame_index, commands_match) in layout.iter().enumerate() {
            let mut frame = Frame::new(format!("p{frame_index}"), "n");
            for (command_index, matches) in commands_match.iter().enumerate() {
                let name = if *matches { "wanted" } else { "other" };
                frame.commands.push(jump_command(
                    name,
                    &format!("t{frame_index}_{command_index}"),
                ));
            }
            stack.push(frame);
        }

        let request = Request::intent("wanted");
        let hit = commands::find(&request, &stack, &ChatPolicy);

        // Expected: innermost frame (highest index) containing a match,
        // and the first matching command inside it.
        let expected = layout
            .iter()
            .enumerate()
            .rev()
            .find_map(|(frame_index, commands_match)| {
                commands_match
                    .iter()
                    .position(|m| *m)
                    .map(|command_index| (frame_index, command_index))
            });

        match (hit, expected) {
            (None, None) => {}
            (Some(hit), Some((frame_index, command_index))) => {
                prop_assert_eq!(hit.frame_index, frame_index);
                prop_assert_eq!(hit.command_index, command_index);
            }
            (hit, expected) => {
                prop_assert!(false, "search disagreed: got {:?}, expected {:?}", hit, expected);
            }
        }
    }

    /// Turn-scoped storage never survives `begin_turn`; interaction-scoped
    /// storage always does.
    #[test]
    fn prop_storage_scope_lifetimes(value in any::<u32>()) {
        use crate::state::{StorageScope, TypedKey};
        const TURN: TypedKey<u32> = TypedKey::new("t", StorageScope::Turn);
        const INTERACTION: TypedKey<u32> = TypedKey::new("i", StorageScope::Interaction);

        let mut storage = SessionStorage::new();
        storage.put(TURN, &value);
        storage.put(INTERACTION, &value);

        storage.begin_turn();
        prop_assert_eq!(storage.get(TURN), None);
        prop_assert_eq!(storage.get(INTERACTION), Some(value));

        storage.end_interaction();
        prop_assert_eq!(storage.get(INTERACTION), None);
    }
}
