use panel_core::RunStatus;
use proptest::prelude::*;

fn any_status() -> impl Strategy<Value = RunStatus> {
    prop_oneof![
        Just(RunStatus::Pending),
        Just(RunStatus::Running),
        Just(RunStatus::Completed),
        Just(RunStatus::Failed),
        Just(RunStatus::Cancelled),
    ]
}

#[test]
fn test_pending_transitions() {
    assert!(RunStatus::Pending.can_transition_to(RunStatus::Running));

    // Invalid
    assert!(!RunStatus::Pending.can_transition_to(RunStatus::Completed));
    assert!(!RunStatus::Pending.can_transition_to(RunStatus::Cancelled));
}

#[test]
fn test_running_transitions() {
    assert!(RunStatus::Running.can_transition_to(RunStatus::Completed));
    assert!(RunStatus::Running.can_transition_to(RunStatus::Failed));
    assert!(RunStatus::Running.can_transition_to(RunStatus::Cancelled));

    assert!(!RunStatus::Running.can_transition_to(RunStatus::Pending));
    assert!(!RunStatus::Running.can_transition_to(RunStatus::Running));
}

proptest! {
    #[test]
    fn prop_terminal_statuses_have_no_exit(from in any_status(), to in any_status()) {
        if from.is_terminal() {
            prop_assert!(!from.can_transition_to(to));
        }
    }

    #[test]
    fn prop_walks_end_in_terminal_at_most_once(steps in proptest::collection::vec(any_status(), 0..12)) {
        let mut status = RunStatus::Pending;
        let mut terminal_entries = 0;
        for to in steps {
            if status.can_transition_to(to) {
                status = to;
                if status.is_terminal() {
                    terminal_entries += 1;
                }
            }
        }
        prop_assert!(terminal_entries <= 1);
    }

    #[test]
    fn prop_no_transition_returns_to_pending(from in any_status()) {
        prop_assert!(!from.can_transition_to(RunStatus::Pending));
    }
}
