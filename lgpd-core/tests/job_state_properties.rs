use lgpd_core::models::JobState;
use proptest::prelude::*;

fn any_state() -> impl Strategy<Value = JobState> {
    prop_oneof![
        Just(JobState::Pending),
        (0u8..=100).prop_map(|progress| JobState::InProgress { progress }),
        Just(JobState::Completed),
        "[a-z ]{0,12}".prop_map(JobState::failed),
    ]
}

proptest! {
    #[test]
    fn progress_never_moves_backwards(p in 0u8..=100, q in 0u8..=255) {
        let from = JobState::InProgress { progress: p };
        let to = JobState::InProgress { progress: q };
        prop_assert_eq!(from.can_transition_to(&to), q >= p && q <= 100);
    }

    #[test]
    fn terminal_states_have_no_successor(from in any_state(), to in any_state()) {
        if from.is_terminal() {
            prop_assert!(!from.can_transition_to(&to));
        }
    }

    #[test]
    fn completion_requires_full_progress(p in 0u8..=100) {
        let from = JobState::InProgress { progress: p };
        prop_assert_eq!(from.can_transition_to(&JobState::Completed), p == 100);
    }

    #[test]
    fn persisted_columns_rebuild_the_state(state in any_state()) {
        let progress = state.progress().unwrap_or(0);
        let reason = state.failure_reason().map(str::to_string);
        prop_assert_eq!(JobState::from_columns(state.name(), progress, reason), Some(state));
    }
}
