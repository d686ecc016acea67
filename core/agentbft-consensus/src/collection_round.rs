//! Generic collection round
//!
//! A collection round gathers one payload per participant into a ledger and
//! is evaluated once per block. Concrete rounds pick a threshold rule and a
//! classifier and implement their decision on top of [`CollectionRound`].

use std::collections::BTreeSet;

use tracing::debug;

use agentbft_state::{consensus_threshold, SynchronizedData};

use crate::errors::{RoundError, RoundResult};
use crate::ledger::CollectionLedger;
use crate::types::{ParticipantId, Payload, RoundId, RoundStatus};

/// Round behaviour the app driver relies on
pub trait AbciRound<E, P> {
    fn round_id(&self) -> RoundId;

    /// Snapshot the round was created from
    fn synchronized_data(&self) -> &SynchronizedData;

    /// Number of payloads collected so far
    fn collected(&self) -> usize;

    fn status(&self) -> RoundStatus;

    /// Ingest a payload delivered in the current block
    fn process_payload(&mut self, payload: P) -> RoundResult<()>;

    /// Record that a participant dropped out for this round instance
    fn mark_unreachable(&mut self, sender: &str) -> RoundResult<()>;

    /// Evaluate the round at the end of a block.
    ///
    /// `None` leaves the round pending. An event is returned at most once per
    /// round instance, together with the snapshot the next round starts from.
    fn end_block(&mut self) -> RoundResult<Option<(SynchronizedData, E)>>;

    /// Return a resolved round to pending, keeping its collection.
    ///
    /// Used by the driver when the emitted event could not be applied.
    fn reopen(&mut self);
}

/// When a collection counts as complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionThreshold {
    /// Every participant reported
    All,
    /// At least the BFT consensus threshold reported
    Consensus,
    /// At least a fixed number reported
    AtLeast(usize),
}

impl CollectionThreshold {
    pub fn is_reached(&self, collected: usize, nb_participants: usize) -> bool {
        match self {
            CollectionThreshold::All => collected == nb_participants,
            CollectionThreshold::Consensus => collected >= consensus_threshold(nb_participants),
            CollectionThreshold::AtLeast(required) => collected >= *required,
        }
    }
}

/// Result of classifying one payload
#[derive(Debug, Clone, PartialEq)]
pub enum Classified<T> {
    Error,
    Ok(T),
}

/// Splits payloads into errors and decoded successes
pub trait PayloadClassifier<P> {
    type Ok;

    /// Classify a payload. Decoding failures of ok payloads are errors of
    /// the round, not `Classified::Error`.
    fn classify(&self, payload: &P) -> RoundResult<Classified<Self::Ok>>;
}

/// Ledger split by classification
#[derive(Debug, Clone, PartialEq)]
pub struct Partition<T> {
    pub num_errors: usize,
    /// Decoded ok entries in ledger order
    pub ok: Vec<(ParticipantId, T)>,
}

/// Collection state of one round instance
#[derive(Debug, Clone)]
pub struct CollectionRound<P> {
    round_id: RoundId,
    synchronized_data: SynchronizedData,
    participants: BTreeSet<ParticipantId>,
    max_participants: usize,
    threshold: CollectionThreshold,
    collection: CollectionLedger<P>,
    status: RoundStatus,
}

impl<P: Payload> CollectionRound<P> {
    /// Fresh round instance with an empty ledger
    pub fn new(
        round_id: RoundId,
        synchronized_data: SynchronizedData,
        threshold: CollectionThreshold,
    ) -> RoundResult<Self> {
        let participants = synchronized_data.participants()?;
        let max_participants = synchronized_data.max_participants()?;

        debug!(
            "Starting {} with {} participants ({} max)",
            round_id,
            participants.len(),
            max_participants
        );

        Ok(Self {
            round_id,
            synchronized_data,
            participants,
            max_participants,
            threshold,
            collection: CollectionLedger::new(),
            status: RoundStatus::Pending,
        })
    }

    pub fn round_id(&self) -> RoundId {
        self.round_id
    }

    pub fn synchronized_data(&self) -> &SynchronizedData {
        &self.synchronized_data
    }

    pub fn collection(&self) -> &CollectionLedger<P> {
        &self.collection
    }

    pub fn status(&self) -> RoundStatus {
        self.status
    }

    pub fn is_resolved(&self) -> bool {
        self.status == RoundStatus::Resolved
    }

    pub fn nb_participants(&self) -> usize {
        self.participants.len()
    }

    pub fn max_participants(&self) -> usize {
        self.max_participants
    }

    /// Add a payload to the ledger
    pub fn process_payload(&mut self, payload: P) -> RoundResult<()> {
        if self.is_resolved() {
            return Err(RoundError::RoundResolved(self.round_id));
        }

        let sender = payload.sender().to_string();
        if !self.participants.contains(&sender) {
            return Err(RoundError::UnknownParticipant {
                sender,
                round: self.round_id,
            });
        }

        if self.collection.record(sender.clone(), payload) {
            debug!(
                "{}: recorded payload from {} ({}/{})",
                self.round_id,
                sender,
                self.collection.len(),
                self.nb_participants()
            );
        } else {
            debug!("{}: replaced payload from {}", self.round_id, sender);
        }

        Ok(())
    }

    pub fn mark_unreachable(&mut self, sender: &str) -> RoundResult<()> {
        if !self.participants.contains(sender) {
            return Err(RoundError::UnknownParticipant {
                sender: sender.to_string(),
                round: self.round_id,
            });
        }
        if self.collection.mark_unreachable(sender) {
            debug!("{}: participant {} marked unreachable", self.round_id, sender);
        }
        Ok(())
    }

    pub fn collection_threshold_reached(&self) -> bool {
        self.threshold
            .is_reached(self.collection.len(), self.nb_participants())
    }

    pub fn is_majority_possible(&self) -> bool {
        self.collection
            .majority_still_possible(self.nb_participants())
    }

    /// Classify every entry, in ledger order
    pub fn partition<C>(&self, classifier: &C) -> RoundResult<Partition<C::Ok>>
    where
        C: PayloadClassifier<P>,
    {
        let mut num_errors = 0;
        let mut ok = Vec::with_capacity(self.collection.len());

        for (sender, payload) in self.collection.iter() {
            match classifier.classify(payload)? {
                Classified::Error => num_errors += 1,
                Classified::Ok(value) => ok.push((sender.clone(), value)),
            }
        }

        Ok(Partition { num_errors, ok })
    }

    pub fn reopen(&mut self) {
        if self.is_resolved() {
            debug!("{}: reopened with {} payloads", self.round_id, self.collection.len());
            self.status = RoundStatus::Pending;
        }
    }

    /// Mark the round resolved and hand back its outcome
    pub fn resolve<E>(&mut self, synchronized_data: SynchronizedData, event: E) -> (SynchronizedData, E) {
        self.status = RoundStatus::Resolved;
        (synchronized_data, event)
    }
}
