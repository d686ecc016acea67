//! Task execution app
//!
//! Every agent runs the requested task off-chain and submits either its
//! result envelope or the error marker. The single collection round waits for
//! all of them and ends in one of two final states:
//!
//! ```text
//! task_execution_round --done--------> finished_task_execution_round
//! task_execution_round --error-------> finished_task_execution_with_error_round
//! task_execution_round --no_majority-> task_execution_round (fresh instance)
//! task_execution_round --round_timeout-> task_execution_round (fresh instance)
//! ```

pub mod payloads;
pub mod rounds;

pub use payloads::{TaskExecutionPayload, TaskResultEnvelope, ERROR_PAYLOAD};
pub use rounds::{
    ErrorSentinelClassifier, Event, FinishedTaskData, TaskExecutionData, TaskExecutionRound,
    FINISHED_TASK_DATA_KEY, FINISHED_TASK_EXECUTION_ROUND,
    FINISHED_TASK_EXECUTION_WITH_ERROR_ROUND, TASK_EXECUTION_ROUND,
};

use agentbft_state::SynchronizedData;

use crate::app::AbciApp;
use crate::config::AppConfig;
use crate::errors::{RoundResult, TransitionError};
use crate::transition::TransitionFunction;

/// Task execution app driver
pub type TaskExecutionAbciApp = AbciApp<Event, TaskExecutionPayload>;

/// Transition function of the task execution app
pub fn transition_function() -> Result<TransitionFunction<Event>, TransitionError> {
    TransitionFunction::builder(TASK_EXECUTION_ROUND)
        .transition(TASK_EXECUTION_ROUND, Event::Done, FINISHED_TASK_EXECUTION_ROUND)
        .transition(TASK_EXECUTION_ROUND, Event::NoMajority, TASK_EXECUTION_ROUND)
        .transition(TASK_EXECUTION_ROUND, Event::RoundTimeout, TASK_EXECUTION_ROUND)
        .transition(TASK_EXECUTION_ROUND, Event::Error, FINISHED_TASK_EXECUTION_WITH_ERROR_ROUND)
        .final_state(FINISHED_TASK_EXECUTION_ROUND)
        .final_state(FINISHED_TASK_EXECUTION_WITH_ERROR_ROUND)
        .build()
}

/// Build the app and start its initial round
pub fn build_app(
    config: &AppConfig,
    synchronized_data: SynchronizedData,
) -> RoundResult<TaskExecutionAbciApp> {
    AbciApp::builder(transition_function()?)
        .round(TASK_EXECUTION_ROUND, TaskExecutionRound::factory)
        .event_timeout(Event::RoundTimeout, config.round_timeout())
        .cross_period_persisted_keys(config.cross_period_persisted_keys.clone())
        .db_pre_condition(TASK_EXECUTION_ROUND, Vec::<String>::new())
        .db_post_condition(FINISHED_TASK_EXECUTION_ROUND, [FINISHED_TASK_DATA_KEY])
        .db_post_condition(FINISHED_TASK_EXECUTION_WITH_ERROR_ROUND, Vec::<String>::new())
        .enable_metrics(config.enable_metrics)
        .build(synchronized_data)
}
