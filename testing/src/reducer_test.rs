//! Given/when/then harness for state machine reducers.

#![allow(clippy::module_name_repetitions)]

use standbook_core::reducer::Reducer;
use std::fmt::Debug;

type Check<T> = Box<dyn FnOnce(&T)>;
type SliceCheck<T> = Box<dyn FnOnce(&[T])>;

/// What the action is expected to do.
enum Expect<R: Reducer> {
    Accepted(Vec<SliceCheck<R::Effect>>),
    Rejected(Check<R::Error>),
}

/// Drives one action through a reducer and checks the outcome.
///
/// An action is expected to be accepted unless [`ReducerTest::then_error`]
/// is called. State checks run either way, which lets a test assert that a
/// rejected action left the state as it was.
///
/// # Example
///
/// ```ignore
/// ReducerTest::new(ReservationReducer)
///     .with_env(ReservationEnvironment::new(Arc::new(test_clock())))
///     .given_state(Some(pending))
///     .when_action(ReservationAction::Confirm { reservation_id })
///     .then_state(|state| {
///         assert_eq!(state.as_ref().unwrap().state, ReservationState::Reserved);
///     })
///     .then_effects(|effects| assert_eq!(effects.len(), 2))
///     .run();
/// ```
pub struct ReducerTest<R: Reducer> {
    reducer: R,
    env: Option<R::Environment>,
    state: Option<R::State>,
    action: Option<R::Action>,
    state_checks: Vec<Check<R::State>>,
    expect: Expect<R>,
}

impl<R> ReducerTest<R>
where
    R: Reducer,
    R::Effect: Debug,
    R::Error: Debug,
{
    /// Start a scenario for `reducer`.
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            env: None,
            state: None,
            action: None,
            state_checks: Vec::new(),
            expect: Expect::Accepted(Vec::new()),
        }
    }

    /// Dependencies handed to the reducer.
    #[must_use]
    pub fn with_env(mut self, env: R::Environment) -> Self {
        self.env = Some(env);
        self
    }

    /// Starting state.
    #[must_use]
    pub fn given_state(mut self, state: R::State) -> Self {
        self.state = Some(state);
        self
    }

    /// The action under test.
    #[must_use]
    pub fn when_action(mut self, action: R::Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Check the state after the action.
    #[must_use]
    pub fn then_state(mut self, check: impl FnOnce(&R::State) + 'static) -> Self {
        self.state_checks.push(Box::new(check));
        self
    }

    /// Check the effects of an accepted action.
    ///
    /// Ignored once [`then_error`](Self::then_error) has been called.
    #[must_use]
    pub fn then_effects(mut self, check: impl FnOnce(&[R::Effect]) + 'static) -> Self {
        if let Expect::Accepted(checks) = &mut self.expect {
            checks.push(Box::new(check));
        }
        self
    }

    /// Expect the action to be rejected and check the error.
    #[must_use]
    pub fn then_error(mut self, check: impl FnOnce(&R::Error) + 'static) -> Self {
        self.expect = Expect::Rejected(Box::new(check));
        self
    }

    /// Apply the action and run every check.
    ///
    /// # Panics
    ///
    /// When the environment, state or action is missing, when the action is
    /// accepted or rejected contrary to expectation, or when a check fails.
    #[allow(clippy::panic)]
    pub fn run(self) {
        let (Some(env), Some(mut state), Some(action)) = (self.env, self.state, self.action)
        else {
            panic!("ReducerTest needs with_env, given_state and when_action before run");
        };

        match (self.reducer.reduce(&mut state, action, &env), self.expect) {
            (Ok(effects), Expect::Accepted(checks)) => {
                for check in checks {
                    check(&effects);
                }
            }
            (Err(error), Expect::Rejected(check)) => check(&error),
            (Ok(effects), Expect::Rejected(_)) => {
                panic!("expected a rejection, got effects {effects:?}")
            }
            (Err(error), Expect::Accepted(_)) => panic!("expected acceptance, got {error:?}"),
        }

        for check in self.state_checks {
            check(&state);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{fixtures, test_clock};
    use standbook_core::reservation::{
        Effect, ReservationAction, ReservationEnvironment, ReservationReducer,
    };
    use standbook_core::{PlanId, ReservationError, ReservationState};
    use std::sync::Arc;

    fn env() -> ReservationEnvironment {
        ReservationEnvironment::new(Arc::new(test_clock()))
    }

    #[test]
    fn test_accepted_action_runs_effect_and_state_checks() {
        let pending = fixtures::reservation(
            fixtures::space(PlanId::new()).id,
            Some("alice"),
            ReservationState::Pending,
        );
        let reservation_id = pending.id;

        ReducerTest::new(ReservationReducer)
            .with_env(env())
            .given_state(Some(pending))
            .when_action(ReservationAction::Confirm { reservation_id })
            .then_effects(move |effects| {
                assert!(effects.contains(&Effect::ClearExpiry { reservation_id }));
            })
            .then_state(|state| {
                assert_eq!(state.as_ref().unwrap().state, ReservationState::Reserved);
            })
            .run();
    }

    #[test]
    fn test_rejected_action_leaves_state() {
        let expired = fixtures::reservation(
            fixtures::space(PlanId::new()).id,
            Some("alice"),
            ReservationState::Expired,
        );
        let reservation_id = expired.id;

        ReducerTest::new(ReservationReducer)
            .with_env(env())
            .given_state(Some(expired))
            .when_action(ReservationAction::Confirm { reservation_id })
            .then_error(|error| assert!(matches!(error, ReservationError::InvalidState { .. })))
            .then_state(|state| {
                assert_eq!(state.as_ref().unwrap().state, ReservationState::Expired);
            })
            .run();
    }

    #[test]
    #[should_panic(expected = "expected a rejection")]
    fn test_unexpected_acceptance_fails() {
        let pending = fixtures::reservation(
            fixtures::space(PlanId::new()).id,
            None,
            ReservationState::Pending,
        );
        let reservation_id = pending.id;

        ReducerTest::new(ReservationReducer)
            .with_env(env())
            .given_state(Some(pending))
            .when_action(ReservationAction::Reject { reservation_id })
            .then_error(|_| {})
            .run();
    }
}
