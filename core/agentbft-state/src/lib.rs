//! Replicated state for AgentBFT rounds
//!
//! This crate provides the append-only application database shared by every
//! replica and the immutable `SynchronizedData` view rounds read from and
//! derive new snapshots out of.

pub mod db;
pub mod errors;
pub mod synchronized_data;

pub use db::{AbciAppDb, DEFAULT_CROSS_PERIOD_KEYS};
pub use errors::{StateError, StateResult};
pub use synchronized_data::{
    consensus_threshold, SynchronizedData, ALL_PARTICIPANTS_KEY, PARTICIPANTS_KEY,
};

/// Re-export commonly used items
pub mod prelude {
    pub use crate::{AbciAppDb, StateError, StateResult, SynchronizedData};
}
