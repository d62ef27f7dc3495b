//! Transition validity policy.
//!
//! The analyzer only ever asks two questions of the policy: may this atom
//! begin running, and may this atom begin reverting. The table itself is
//! owned by whoever writes states into the store; `DefaultTransitions` is the
//! table the bundled stores enforce.

use atomflow_types::state::AtomState;

/// Predicate deciding whether `from -> to` is a legal state change.
///
/// Implementations must be deterministic and side-effect free.
pub trait TransitionValidator: Send + Sync {
    fn is_valid_transition(&self, from: AtomState, to: AtomState) -> bool;
}

impl<F> TransitionValidator for F
where
    F: Fn(AtomState, AtomState) -> bool + Send + Sync,
{
    fn is_valid_transition(&self, from: AtomState, to: AtomState) -> bool {
        self(from, to)
    }
}

/// Allowed `(from, to)` pairs of the default lifecycle.
const ALLOWED_TRANSITIONS: &[(AtomState, AtomState)] = &[
    // run it
    (AtomState::Pending, AtomState::Running),
    (AtomState::Running, AtomState::Success),
    (AtomState::Running, AtomState::Failure),
    // undo after our own failure or somebody else's
    (AtomState::Failure, AtomState::Reverting),
    (AtomState::Success, AtomState::Reverting),
    (AtomState::Reverting, AtomState::Reverted),
    (AtomState::Reverting, AtomState::Failure),
    // try again
    (AtomState::Reverted, AtomState::Pending),
    // retry controllers only
    (AtomState::Success, AtomState::Retrying),
    (AtomState::Retrying, AtomState::Running),
];

/// The default task and retry controller lifecycle.
///
/// Every pair not in the table, self-transitions included, is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultTransitions;

impl TransitionValidator for DefaultTransitions {
    fn is_valid_transition(&self, from: AtomState, to: AtomState) -> bool {
        ALLOWED_TRANSITIONS.contains(&(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_accepts_listed_pairs_only() {
        let policy = DefaultTransitions;
        let mut accepted = Vec::new();
        for from in AtomState::ALL {
            for to in AtomState::ALL {
                if policy.is_valid_transition(from, to) {
                    accepted.push((from, to));
                }
            }
        }
        assert_eq!(accepted.len(), ALLOWED_TRANSITIONS.len());
        for pair in ALLOWED_TRANSITIONS {
            assert!(accepted.contains(pair), "missing {pair:?}");
        }
    }

    #[test]
    fn test_entering_running() {
        let policy = DefaultTransitions;
        let may_run: Vec<AtomState> = AtomState::ALL
            .into_iter()
            .filter(|s| policy.is_valid_transition(*s, AtomState::Running))
            .collect();
        assert_eq!(may_run, vec![AtomState::Pending, AtomState::Retrying]);
    }

    #[test]
    fn test_entering_reverting() {
        let policy = DefaultTransitions;
        let may_revert: Vec<AtomState> = AtomState::ALL
            .into_iter()
            .filter(|s| policy.is_valid_transition(*s, AtomState::Reverting))
            .collect();
        assert_eq!(may_revert, vec![AtomState::Success, AtomState::Failure]);
    }

    #[test]
    fn test_self_transitions_rejected() {
        for state in AtomState::ALL {
            assert!(!DefaultTransitions.is_valid_transition(state, state));
        }
    }

    #[test]
    fn test_closure_is_a_validator() {
        let permissive = |_: AtomState, _: AtomState| true;
        assert!(permissive.is_valid_transition(AtomState::Reverted, AtomState::Running));
    }
}
