//! AgentBFT Consensus Module
//!
//! Round-based agreement for multi-agent task execution: payload ledgers,
//! a generic collection round, validated transition graphs and the app
//! driver tying them together, plus the task execution app built on them.

pub mod app;
pub mod collection_round;
pub mod config;
pub mod errors;
pub mod ledger;
pub mod metrics;
pub mod task_execution;
pub mod transition;
pub mod types;

// Re-export main types for public API
pub use app::{AbciApp, AbciAppBuilder, RoundFactory, Transition};
pub use collection_round::{
    AbciRound, Classified, CollectionRound, CollectionThreshold, Partition, PayloadClassifier,
};
pub use config::AppConfig;
pub use errors::{RoundError, RoundResult, TransitionError};
pub use ledger::CollectionLedger;
pub use task_execution::{
    Event, FinishedTaskData, TaskExecutionAbciApp, TaskExecutionData, TaskExecutionPayload,
    TaskExecutionRound, TaskResultEnvelope,
};
pub use transition::{TransitionFunction, TransitionFunctionBuilder};
pub use types::{AbciEvent, ParticipantId, Payload, RoundId, RoundStatus};

pub use agentbft_state::{SynchronizedData, StateError};
