//! Core types shared by rounds and apps

use serde::Serialize;
use std::fmt;
use std::hash::Hash;

/// Participant identity (public key or node id)
pub type ParticipantId = String;

/// Name of a round in an app's transition graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RoundId(&'static str);

impl RoundId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Event enum driving an app's transition function
pub trait AbciEvent: Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display + 'static {
    /// Every variant, used to check the transition function is total
    const ALL: &'static [Self];
}

/// Payload submitted by a participant
pub trait Payload: Clone + fmt::Debug {
    fn sender(&self) -> &str;

    /// Content compared when grouping identical submissions
    fn content(&self) -> &str;
}

/// Round status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RoundStatus {
    /// Waiting for more payloads
    Pending,
    /// Event emitted
    Resolved,
}

impl Default for RoundStatus {
    fn default() -> Self {
        RoundStatus::Pending
    }
}
