use crate::TransitionError;

/// Progress of a single reconciliation pass over a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Pending,
    Fetched,
    /// workspace no longer exists
    Gone,
    FirstBindingEnsured,
    SecondBindingEnsured,
    /// second binding was just created, come back later
    Requeued,
    InitializersCleared,
}

/// Work to do to leave a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    FetchWorkspace,
    EnsureFirstBinding,
    EnsureSecondBinding,
    ClearInitializers,
}

/// Result of running an [`Action`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Found,
    NotFound,
    Created,
    AlreadyExists,
    Cleared,
    AlreadyCleared,
}

impl ReconcileState {
    pub fn next_action(&self) -> Option<Action> {
        match self {
            Self::Pending => Some(Action::FetchWorkspace),
            Self::Fetched => Some(Action::EnsureFirstBinding),
            Self::FirstBindingEnsured => Some(Action::EnsureSecondBinding),
            Self::SecondBindingEnsured => Some(Action::ClearInitializers),
            Self::Gone | Self::Requeued | Self::InitializersCleared => None,
        }
    }

    pub fn advance(self, outcome: StepOutcome) -> Result<Self, TransitionError> {
        use StepOutcome::*;

        match (self, outcome) {
            (Self::Pending, Found) => Ok(Self::Fetched),
            (Self::Pending, NotFound) => Ok(Self::Gone),
            (Self::Fetched, Created | AlreadyExists) => Ok(Self::FirstBindingEnsured),
            (Self::FirstBindingEnsured, Created) => Ok(Self::Requeued),
            (Self::FirstBindingEnsured, AlreadyExists) => Ok(Self::SecondBindingEnsured),
            (Self::SecondBindingEnsured, Cleared | AlreadyCleared) => {
                Ok(Self::InitializersCleared)
            }
            (state, outcome) => Err(TransitionError { state, outcome }),
        }
    }
}

#[cfg(test)]
mod test {

    use super::Action;
    use super::ReconcileState;
    use super::StepOutcome;

    fn run(outcomes: &[StepOutcome]) -> (ReconcileState, Vec<Action>) {
        let mut state = ReconcileState::Pending;
        let mut actions = vec![];
        for outcome in outcomes {
            let action = state.next_action().expect("action");
            actions.push(action);
            state = state.advance(*outcome).expect("transition");
        }
        (state, actions)
    }

    #[test]
    fn test_new_workspace_requeues_after_second_binding() {
        let (state, actions) = run(&[
            StepOutcome::Found,
            StepOutcome::Created,
            StepOutcome::Created,
        ]);
        assert_eq!(state, ReconcileState::Requeued);
        assert_eq!(state.next_action(), None);
        assert_eq!(
            actions,
            vec![
                Action::FetchWorkspace,
                Action::EnsureFirstBinding,
                Action::EnsureSecondBinding
            ]
        );
    }

    #[test]
    fn test_bound_workspace_completes() {
        let (state, actions) = run(&[
            StepOutcome::Found,
            StepOutcome::AlreadyExists,
            StepOutcome::AlreadyExists,
            StepOutcome::Cleared,
        ]);
        assert_eq!(state, ReconcileState::InitializersCleared);
        assert_eq!(state.next_action(), None);
        assert_eq!(actions.last(), Some(&Action::ClearInitializers));
    }

    #[test]
    fn test_missing_workspace_is_terminal() {
        let (state, _) = run(&[StepOutcome::NotFound]);
        assert_eq!(state, ReconcileState::Gone);
        assert_eq!(state.next_action(), None);
    }

    #[test]
    fn test_invalid_transition_is_error() {
        let err = ReconcileState::Pending
            .advance(StepOutcome::Created)
            .expect_err("invalid");
        assert_eq!(err.state, ReconcileState::Pending);
        assert_eq!(err.outcome, StepOutcome::Created);

        assert!(ReconcileState::Fetched.advance(StepOutcome::Cleared).is_err());
        assert!(
            ReconcileState::InitializersCleared
                .advance(StepOutcome::Found)
                .is_err()
        );
    }
}
