//! Collected-payload ledger for a single round instance
//!
//! The ledger maps each participant to the payload it submitted and keeps
//! insertion order, so every replica that ingests the same batch iterates the
//! entries in the same order.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;

use agentbft_state::consensus_threshold;

use crate::types::{ParticipantId, Payload};

/// Payloads collected in the current round, keyed by sender
#[derive(Debug, Clone)]
pub struct CollectionLedger<P> {
    entries: IndexMap<ParticipantId, P>,

    /// Participants known to never report in this round instance
    unreachable: BTreeSet<ParticipantId>,
}

impl<P> Default for CollectionLedger<P> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
            unreachable: BTreeSet::new(),
        }
    }
}

impl<P> CollectionLedger<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a payload, replacing any earlier one from the same sender.
    ///
    /// Returns `true` when the sender had not submitted before. A replaced
    /// entry keeps its original position.
    pub fn record(&mut self, sender: impl Into<ParticipantId>, payload: P) -> bool {
        let sender = sender.into();
        self.unreachable.remove(&sender);
        self.entries.insert(sender, payload).is_none()
    }

    /// Mark a participant as permanently dropped out.
    ///
    /// Ignored for participants that already submitted.
    pub fn mark_unreachable(&mut self, sender: impl Into<ParticipantId>) -> bool {
        let sender = sender.into();
        if self.entries.contains_key(&sender) {
            return false;
        }
        self.unreachable.insert(sender)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, sender: &str) -> Option<&P> {
        self.entries.get(sender)
    }

    pub fn contains(&self, sender: &str) -> bool {
        self.entries.contains_key(sender)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantId, &P)> {
        self.entries.iter()
    }

    /// Senders in insertion order
    pub fn senders(&self) -> impl Iterator<Item = &ParticipantId> {
        self.entries.keys()
    }

    pub fn unreachable_count(&self) -> usize {
        self.unreachable.len()
    }

    /// Every participant has reported
    pub fn threshold_reached(&self, nb_participants: usize) -> bool {
        self.entries.len() == nb_participants
    }

    /// Participants that may still submit a payload
    pub fn outstanding(&self, nb_participants: usize) -> usize {
        nb_participants.saturating_sub(self.entries.len() + self.unreachable.len())
    }
}

impl<P: Payload> CollectionLedger<P> {
    /// Size of the largest group of identical payloads
    pub fn largest_vote_count(&self) -> usize {
        let mut votes: BTreeMap<&str, usize> = BTreeMap::new();
        for payload in self.entries.values() {
            *votes.entry(payload.content()).or_default() += 1;
        }
        votes.values().copied().max().unwrap_or(0)
    }

    /// Whether the outstanding participants can still push some payload
    /// over the consensus threshold
    pub fn majority_still_possible(&self, nb_participants: usize) -> bool {
        self.largest_vote_count() + self.outstanding(nb_participants)
            >= consensus_threshold(nb_participants)
    }
}
