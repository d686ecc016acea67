//! Round transition graph
//!
//! A transition function maps (round, event) to the next round. It is built
//! once per app and validated before use, so lookups at runtime only fail
//! for events a round is not supposed to emit.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::errors::TransitionError;
use crate::types::{AbciEvent, RoundId};

/// Validated transition table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionFunction<E: AbciEvent> {
    initial_round: RoundId,
    initial_states: BTreeSet<RoundId>,
    final_states: BTreeSet<RoundId>,
    transitions: BTreeMap<RoundId, BTreeMap<E, RoundId>>,
}

impl<E: AbciEvent> TransitionFunction<E> {
    pub fn builder(initial_round: RoundId) -> TransitionFunctionBuilder<E> {
        TransitionFunctionBuilder::new(initial_round)
    }

    pub fn initial_round(&self) -> RoundId {
        self.initial_round
    }

    /// Rounds the app may be started from
    pub fn initial_states(&self) -> &BTreeSet<RoundId> {
        &self.initial_states
    }

    pub fn final_states(&self) -> &BTreeSet<RoundId> {
        &self.final_states
    }

    pub fn is_final(&self, round: RoundId) -> bool {
        self.final_states.contains(&round)
    }

    pub fn contains(&self, round: RoundId) -> bool {
        self.transitions.contains_key(&round)
    }

    /// Every round of the graph
    pub fn rounds(&self) -> impl Iterator<Item = RoundId> + '_ {
        self.transitions.keys().copied()
    }

    /// Outgoing edges of a round
    pub fn transitions_from(&self, round: RoundId) -> impl Iterator<Item = (E, RoundId)> + '_ {
        self.transitions
            .get(&round)
            .into_iter()
            .flat_map(|edges| edges.iter().map(|(event, next)| (*event, *next)))
    }

    pub fn next_round(&self, round: RoundId, event: E) -> Option<RoundId> {
        self.transitions
            .get(&round)
            .and_then(|edges| edges.get(&event))
            .copied()
    }
}

/// Builder for [`TransitionFunction`]
#[derive(Debug, Clone)]
pub struct TransitionFunctionBuilder<E: AbciEvent> {
    initial_round: RoundId,
    initial_states: BTreeSet<RoundId>,
    final_states: BTreeSet<RoundId>,
    transitions: BTreeMap<RoundId, BTreeMap<E, RoundId>>,
}

impl<E: AbciEvent> TransitionFunctionBuilder<E> {
    pub fn new(initial_round: RoundId) -> Self {
        let mut initial_states = BTreeSet::new();
        initial_states.insert(initial_round);

        Self {
            initial_round,
            initial_states,
            final_states: BTreeSet::new(),
            transitions: BTreeMap::new(),
        }
    }

    /// Add an edge
    pub fn transition(mut self, from: RoundId, event: E, to: RoundId) -> Self {
        self.transitions.entry(from).or_default().insert(event, to);
        self
    }

    /// Declare an absorbing state
    pub fn final_state(mut self, round: RoundId) -> Self {
        self.transitions.entry(round).or_default();
        self.final_states.insert(round);
        self
    }

    /// Declare an additional round the app may be started from
    pub fn initial_state(mut self, round: RoundId) -> Self {
        self.initial_states.insert(round);
        self
    }

    pub fn build(self) -> Result<TransitionFunction<E>, TransitionError> {
        for round in &self.initial_states {
            if !self.transitions.contains_key(round) {
                return Err(TransitionError::UnknownInitialRound(*round));
            }
            if self.final_states.contains(round) {
                return Err(TransitionError::InitialRoundIsFinal(*round));
            }
        }

        if self.final_states.is_empty() {
            return Err(TransitionError::NoFinalStates);
        }

        for (round, edges) in &self.transitions {
            if self.final_states.contains(round) {
                if !edges.is_empty() {
                    return Err(TransitionError::FinalStateHasTransitions(*round));
                }
                continue;
            }

            for (event, next) in edges {
                if !self.transitions.contains_key(next) {
                    return Err(TransitionError::UnknownTarget {
                        from: *round,
                        event: event.to_string(),
                        to: *next,
                    });
                }
            }

            for event in E::ALL {
                if !edges.contains_key(event) {
                    return Err(TransitionError::MissingTransition {
                        round: *round,
                        event: event.to_string(),
                    });
                }
            }
        }

        let reachable = self.reachable_rounds();
        if let Some(round) = self.transitions.keys().find(|round| !reachable.contains(*round)) {
            return Err(TransitionError::Unreachable(*round));
        }

        Ok(TransitionFunction {
            initial_round: self.initial_round,
            initial_states: self.initial_states,
            final_states: self.final_states,
            transitions: self.transitions,
        })
    }

    fn reachable_rounds(&self) -> BTreeSet<RoundId> {
        let mut seen: BTreeSet<RoundId> = self.initial_states.clone();
        let mut queue: VecDeque<RoundId> = self.initial_states.iter().copied().collect();

        while let Some(round) = queue.pop_front() {
            if let Some(edges) = self.transitions.get(&round) {
                for next in edges.values() {
                    if seen.insert(*next) {
                        queue.push_back(*next);
                    }
                }
            }
        }

        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    enum Step {
        Next,
        Fail,
    }

    impl fmt::Display for Step {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Step::Next => f.write_str("next"),
                Step::Fail => f.write_str("fail"),
            }
        }
    }

    impl AbciEvent for Step {
        const ALL: &'static [Self] = &[Step::Next, Step::Fail];
    }

    const START: RoundId = RoundId::new("start");
    const MIDDLE: RoundId = RoundId::new("middle");
    const DONE: RoundId = RoundId::new("done");
    const FAILED: RoundId = RoundId::new("failed");

    fn valid() -> TransitionFunctionBuilder<Step> {
        TransitionFunction::builder(START)
            .transition(START, Step::Next, MIDDLE)
            .transition(START, Step::Fail, FAILED)
            .transition(MIDDLE, Step::Next, DONE)
            .transition(MIDDLE, Step::Fail, START)
            .final_state(DONE)
            .final_state(FAILED)
    }

    #[test]
    fn test_lookup() {
        let function = valid().build().unwrap();

        assert_eq!(function.initial_round(), START);
        assert_eq!(function.next_round(START, Step::Next), Some(MIDDLE));
        assert_eq!(function.next_round(MIDDLE, Step::Fail), Some(START));
        assert_eq!(function.next_round(DONE, Step::Next), None);
        assert!(function.is_final(DONE));
        assert!(!function.is_final(MIDDLE));
        assert_eq!(function.rounds().count(), 4);
        assert_eq!(function.transitions_from(START).count(), 2);
        assert_eq!(function.transitions_from(FAILED).count(), 0);
    }

    #[test]
    fn test_rejects_missing_event() {
        let err = TransitionFunction::builder(START)
            .transition(START, Step::Next, DONE)
            .final_state(DONE)
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            TransitionError::MissingTransition {
                round: START,
                event: "fail".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_unknown_target() {
        let err = valid()
            .transition(MIDDLE, Step::Next, RoundId::new("nowhere"))
            .build()
            .unwrap_err();

        assert!(matches!(err, TransitionError::UnknownTarget { from, .. } if from == MIDDLE));
    }

    #[test]
    fn test_rejects_final_state_with_edges() {
        let err = valid()
            .transition(DONE, Step::Next, START)
            .build()
            .unwrap_err();

        assert_eq!(err, TransitionError::FinalStateHasTransitions(DONE));
    }

    #[test]
    fn test_rejects_bad_initial_round() {
        let err = TransitionFunction::<Step>::builder(START)
            .final_state(DONE)
            .build()
            .unwrap_err();
        assert_eq!(err, TransitionError::UnknownInitialRound(START));

        let err = TransitionFunction::<Step>::builder(DONE)
            .final_state(DONE)
            .build()
            .unwrap_err();
        assert_eq!(err, TransitionError::InitialRoundIsFinal(DONE));
    }

    #[test]
    fn test_rejects_unreachable_round() {
        let err = valid()
            .transition(RoundId::new("island"), Step::Next, DONE)
            .transition(RoundId::new("island"), Step::Fail, DONE)
            .build()
            .unwrap_err();

        assert_eq!(err, TransitionError::Unreachable(RoundId::new("island")));
    }

    #[test]
    fn test_rejects_missing_final_states() {
        let err = TransitionFunction::builder(START)
            .transition(START, Step::Next, START)
            .transition(START, Step::Fail, START)
            .build()
            .unwrap_err();

        assert_eq!(err, TransitionError::NoFinalStates);
    }
}
