//! Rounds of the task execution app

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use agentbft_state::{StateResult, SynchronizedData};

use crate::collection_round::{
    AbciRound, Classified, CollectionRound, CollectionThreshold, PayloadClassifier,
};
use crate::errors::{RoundError, RoundResult};
use crate::task_execution::payloads::{TaskExecutionPayload, TaskResultEnvelope};
use crate::types::{AbciEvent, ParticipantId, RoundId, RoundStatus};

/// Key of the aggregated task outcome in the synchronized data
pub const FINISHED_TASK_DATA_KEY: &str = "finished_task_data";

pub const TASK_EXECUTION_ROUND: RoundId = RoundId::new("task_execution_round");
pub const FINISHED_TASK_EXECUTION_ROUND: RoundId = RoundId::new("finished_task_execution_round");
pub const FINISHED_TASK_EXECUTION_WITH_ERROR_ROUND: RoundId =
    RoundId::new("finished_task_execution_with_error_round");

/// Task execution events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    RoundTimeout,
    NoMajority,
    Done,
    Error,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RoundTimeout => "round_timeout",
            Event::NoMajority => "no_majority",
            Event::Done => "done",
            Event::Error => "error",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AbciEvent for Event {
    const ALL: &'static [Self] = &[Event::RoundTimeout, Event::NoMajority, Event::Done, Event::Error];
}

/// Aggregated outcome of a successful round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedTaskData {
    pub request_id: Value,
    /// One result per successful participant, in ledger order
    pub task_result: Vec<Value>,
}

impl FinishedTaskData {
    /// Aggregate decoded ok payloads. `None` when there are none.
    pub fn aggregate(ok: Vec<(ParticipantId, TaskResultEnvelope)>) -> Option<Self> {
        let request_id = ok.first()?.1.request_id.clone();

        let mut task_result = Vec::with_capacity(ok.len());
        for (sender, envelope) in ok {
            if envelope.request_id != request_id {
                warn!(
                    "Participant {} answered request {} instead of {}",
                    sender, envelope.request_id, request_id
                );
            }
            task_result.push(envelope.task_result);
        }

        Some(Self {
            request_id,
            task_result,
        })
    }
}

/// Accessors for the task execution keys of the synchronized data
pub trait TaskExecutionData {
    /// Aggregated outcome; fails if the round has not succeeded
    fn finished_task_data(&self) -> StateResult<FinishedTaskData>;
}

impl TaskExecutionData for SynchronizedData {
    fn finished_task_data(&self) -> StateResult<FinishedTaskData> {
        self.db().get_strict_as(FINISHED_TASK_DATA_KEY)
    }
}

/// Classifies payloads by the error sentinel, decoding everything else
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorSentinelClassifier;

impl PayloadClassifier<TaskExecutionPayload> for ErrorSentinelClassifier {
    type Ok = TaskResultEnvelope;

    fn classify(&self, payload: &TaskExecutionPayload) -> RoundResult<Classified<TaskResultEnvelope>> {
        if payload.is_error() {
            return Ok(Classified::Error);
        }

        serde_json::from_str(&payload.content)
            .map(Classified::Ok)
            .map_err(|source| RoundError::PayloadDecode {
                sender: payload.sender.clone(),
                source,
            })
    }
}

/// Collects one task outcome from every participant
#[derive(Debug, Clone)]
pub struct TaskExecutionRound {
    inner: CollectionRound<TaskExecutionPayload>,
    classifier: ErrorSentinelClassifier,
}

impl TaskExecutionRound {
    pub fn new(synchronized_data: SynchronizedData) -> RoundResult<Self> {
        Ok(Self {
            inner: CollectionRound::new(
                TASK_EXECUTION_ROUND,
                synchronized_data,
                CollectionThreshold::All,
            )?,
            classifier: ErrorSentinelClassifier,
        })
    }

    /// Round factory for the app driver
    pub fn factory(
        synchronized_data: SynchronizedData,
    ) -> RoundResult<Box<dyn AbciRound<Event, TaskExecutionPayload>>> {
        Ok(Box::new(Self::new(synchronized_data)?))
    }

    pub fn collection_round(&self) -> &CollectionRound<TaskExecutionPayload> {
        &self.inner
    }
}

impl AbciRound<Event, TaskExecutionPayload> for TaskExecutionRound {
    fn round_id(&self) -> RoundId {
        self.inner.round_id()
    }

    fn synchronized_data(&self) -> &SynchronizedData {
        self.inner.synchronized_data()
    }

    fn collected(&self) -> usize {
        self.inner.collection().len()
    }

    fn status(&self) -> RoundStatus {
        self.inner.status()
    }

    fn process_payload(&mut self, payload: TaskExecutionPayload) -> RoundResult<()> {
        self.inner.process_payload(payload)
    }

    fn mark_unreachable(&mut self, sender: &str) -> RoundResult<()> {
        self.inner.mark_unreachable(sender)
    }

    fn reopen(&mut self) {
        self.inner.reopen()
    }

    fn end_block(&mut self) -> RoundResult<Option<(SynchronizedData, Event)>> {
        if self.inner.is_resolved() {
            return Ok(None);
        }

        if self.inner.collection_threshold_reached() {
            let partition = self.inner.partition(&self.classifier)?;
            let unchanged = self.inner.synchronized_data().clone();

            if partition.num_errors == self.inner.max_participants() {
                info!("All {} participants reported an error", partition.num_errors);
                return Ok(Some(self.inner.resolve(unchanged, Event::Error)));
            }

            let num_ok = partition.ok.len();
            let finished_task_data = match FinishedTaskData::aggregate(partition.ok) {
                Some(data) => data,
                None => {
                    warn!(
                        "No successful payloads among {} reports ({} max participants)",
                        partition.num_errors,
                        self.inner.max_participants()
                    );
                    return Ok(Some(self.inner.resolve(unchanged, Event::Error)));
                }
            };

            info!(
                "Aggregated {} task results for request {} ({} errors dropped)",
                num_ok, finished_task_data.request_id, partition.num_errors
            );
            let synchronized_data = self
                .inner
                .synchronized_data()
                .update_once(FINISHED_TASK_DATA_KEY, &finished_task_data)?;
            return Ok(Some(self.inner.resolve(synchronized_data, Event::Done)));
        }

        if !self.inner.is_majority_possible() {
            info!(
                "No majority possible with {}/{} payloads and {} unreachable",
                self.inner.collection().len(),
                self.inner.nb_participants(),
                self.inner.collection().unreachable_count()
            );
            let unchanged = self.inner.synchronized_data().clone();
            return Ok(Some(self.inner.resolve(unchanged, Event::NoMajority)));
        }

        Ok(None)
    }
}
