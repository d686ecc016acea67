//! Error types for rounds and apps

use thiserror::Error;

use agentbft_state::StateError;

use crate::types::RoundId;

/// Transition function validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// Initial round has no entry in the table
    #[error("Initial round {0} is not part of the transition function")]
    UnknownInitialRound(RoundId),

    /// Initial round cannot be absorbing
    #[error("Initial round {0} is a final state")]
    InitialRoundIsFinal(RoundId),

    /// Final states must not have outgoing edges
    #[error("Final state {0} has outgoing transitions")]
    FinalStateHasTransitions(RoundId),

    /// Edge into a round that is not a key of the table
    #[error("Transition {from} --{event}--> {to} targets an unknown round")]
    UnknownTarget {
        from: RoundId,
        event: String,
        to: RoundId,
    },

    /// Non-final round without an edge for an event
    #[error("Round {round} has no transition for event {event}")]
    MissingTransition { round: RoundId, event: String },

    /// No absorbing states at all
    #[error("Transition function declares no final states")]
    NoFinalStates,

    /// Round not reachable from the initial round
    #[error("Round {0} is unreachable from the initial round")]
    Unreachable(RoundId),
}

/// Round and app errors
#[derive(Error, Debug)]
pub enum RoundError {
    /// Payload from a sender outside the participant set
    #[error("Sender {sender} is not in the list of participants of {round}")]
    UnknownParticipant { sender: String, round: RoundId },

    /// Payload delivered after the round already emitted its event
    #[error("Round {0} is already resolved")]
    RoundResolved(RoundId),

    /// Payload delivered to an absorbing state
    #[error("Final state {0} accepts no payloads")]
    TerminalRound(RoundId),

    /// Ok payload that does not decode into the expected envelope
    #[error("Payload from {sender} cannot be decoded: {source}")]
    PayloadDecode {
        sender: String,
        #[source]
        source: serde_json::Error,
    },

    /// Event emitted by a round with no edge in the transition function
    #[error("No transition from {round} on event {event}")]
    NoTransition { round: RoundId, event: String },

    /// Round has no registered constructor
    #[error("No round factory registered for {0}")]
    MissingFactory(RoundId),

    /// Key required on entering a round is absent
    #[error("Pre-condition of {round} violated: key {key} not set")]
    PreConditionViolated { round: RoundId, key: String },

    /// Key required on reaching a final state is absent
    #[error("Post-condition of {round} violated: key {key} not set")]
    PostConditionViolated { round: RoundId, key: String },

    /// Operation requires the app to have reached a final state
    #[error("App is still running round {0}")]
    NotFinished(RoundId),

    /// Invalid transition function
    #[error("Invalid transition function: {0}")]
    Transition(#[from] TransitionError),

    /// Synchronized data error
    #[error("State error: {0}")]
    State(#[from] StateError),
}

/// Result type for round operations
pub type RoundResult<T> = Result<T, RoundError>;
