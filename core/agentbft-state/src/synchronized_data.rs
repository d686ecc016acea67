//! Immutable view over the replicated database
//!
//! `SynchronizedData` is shared between the app driver and the active round.
//! Updates never touch the shared database: they clone it, apply the write
//! and hand back a new view, so any holder of the previous view keeps seeing
//! the old state.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use sha3::{Digest, Sha3_256};

use crate::db::AbciAppDb;
use crate::errors::StateResult;

/// Key holding the active participant set
pub const PARTICIPANTS_KEY: &str = "participants";

/// Key holding the full participant set of the service
pub const ALL_PARTICIPANTS_KEY: &str = "all_participants";

/// Number of matching votes a BFT decision needs out of `nb_participants`
pub fn consensus_threshold(nb_participants: usize) -> usize {
    // ceil((2n + 1) / 3)
    (2 * nb_participants + 3) / 3
}

/// Replicated state shared by every round of an app
#[derive(Debug, Clone, PartialEq)]
pub struct SynchronizedData {
    db: Arc<AbciAppDb>,
}

impl SynchronizedData {
    /// Wrap a database
    pub fn new(db: AbciAppDb) -> Self {
        Self { db: Arc::new(db) }
    }

    /// Synchronized data with a sorted, deduplicated participant set
    pub fn with_participants<I, S>(participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let participants: BTreeSet<String> = participants.into_iter().map(Into::into).collect();
        Self::new(AbciAppDb::with_setup([(
            PARTICIPANTS_KEY,
            Value::from(participants.into_iter().collect::<Vec<_>>()),
        )]))
    }

    /// Underlying database
    pub fn db(&self) -> &AbciAppDb {
        &self.db
    }

    /// Current period
    pub fn period_count(&self) -> u64 {
        self.db.period_count()
    }

    /// Active participants
    pub fn participants(&self) -> StateResult<BTreeSet<String>> {
        self.db.get_strict_as(PARTICIPANTS_KEY)
    }

    /// All participants of the service, defaulting to the active set
    pub fn all_participants(&self) -> StateResult<BTreeSet<String>> {
        if self.db.contains(ALL_PARTICIPANTS_KEY) {
            self.db.get_strict_as(ALL_PARTICIPANTS_KEY)
        } else {
            self.participants()
        }
    }

    pub fn nb_participants(&self) -> StateResult<usize> {
        Ok(self.participants()?.len())
    }

    pub fn max_participants(&self) -> StateResult<usize> {
        Ok(self.all_participants()?.len())
    }

    pub fn consensus_threshold(&self) -> StateResult<usize> {
        Ok(consensus_threshold(self.nb_participants()?))
    }

    /// New view with `value` appended under `key`
    pub fn update<T: Serialize>(&self, key: &str, value: &T) -> StateResult<Self> {
        let value = serde_json::to_value(value)?;
        let mut db = AbciAppDb::clone(&self.db);
        db.update(key, value);
        Ok(Self::new(db))
    }

    /// New view with a write-once `key` set
    pub fn update_once<T: Serialize>(&self, key: &str, value: &T) -> StateResult<Self> {
        let value = serde_json::to_value(value)?;
        let mut db = AbciAppDb::clone(&self.db);
        db.update_once(key, value)?;
        Ok(Self::new(db))
    }

    /// View of the next period, carrying over the participants and `persisted_keys`
    pub fn new_period(&self, persisted_keys: &BTreeSet<String>) -> Self {
        Self::new(self.db.new_period(persisted_keys))
    }

    /// Whether both views share the same underlying database
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.db, &other.db)
    }

    /// Deterministic hash of the replicated state
    pub fn state_hash(&self) -> StateResult<[u8; 32]> {
        // map keys are ordered, so the encoding is canonical
        let encoded = serde_json::to_vec(&*self.db)?;

        let mut hasher = Sha3_256::new();
        hasher.update(&encoded);
        let result = hasher.finalize();

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        Ok(hash)
    }

    /// Hex encoded state hash
    pub fn state_hash_hex(&self) -> StateResult<String> {
        Ok(hex::encode(self.state_hash()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StateError;
    use serde_json::json;

    #[test]
    fn test_consensus_threshold() {
        assert_eq!(consensus_threshold(0), 1);
        assert_eq!(consensus_threshold(1), 1);
        assert_eq!(consensus_threshold(3), 3);
        assert_eq!(consensus_threshold(4), 3);
        assert_eq!(consensus_threshold(7), 5);
        assert_eq!(consensus_threshold(10), 7);
    }

    #[test]
    fn test_participants_are_sorted_and_deduplicated() {
        let data = SynchronizedData::with_participants(["carol", "alice", "bob", "alice"]);

        let participants: Vec<_> = data.participants().unwrap().into_iter().collect();
        assert_eq!(participants, vec!["alice", "bob", "carol"]);
        assert_eq!(data.nb_participants().unwrap(), 3);
        assert_eq!(data.max_participants().unwrap(), 3);
    }

    #[test]
    fn test_all_participants_override() {
        let data = SynchronizedData::with_participants(["a", "b"])
            .update(ALL_PARTICIPANTS_KEY, &["a", "b", "c", "d"])
            .unwrap();

        assert_eq!(data.nb_participants().unwrap(), 2);
        assert_eq!(data.max_participants().unwrap(), 4);
    }

    #[test]
    fn test_missing_participants_fail_loudly() {
        let data = SynchronizedData::new(AbciAppDb::new());
        assert!(matches!(data.participants(), Err(StateError::KeyNotFound(_))));
    }

    #[test]
    fn test_update_is_copy_on_write() {
        let original = SynchronizedData::with_participants(["a"]);
        let updated = original.update_once("finished", &json!({"ok": true})).unwrap();

        assert!(!original.db().contains("finished"));
        assert_eq!(updated.db().get_strict("finished").unwrap(), &json!({"ok": true}));
        assert!(!original.ptr_eq(&updated));

        let clone = original.clone();
        assert!(original.ptr_eq(&clone));
    }

    #[test]
    fn test_state_hash_is_deterministic() {
        let a = SynchronizedData::with_participants(["x", "y"])
            .update("k1", &1)
            .unwrap()
            .update("k2", &"v")
            .unwrap();
        let b = SynchronizedData::with_participants(["y", "x"])
            .update("k1", &1)
            .unwrap()
            .update("k2", &"v")
            .unwrap();

        assert_eq!(a.state_hash().unwrap(), b.state_hash().unwrap());
        assert_eq!(a.state_hash_hex().unwrap().len(), 64);

        let c = a.update("k2", &"w").unwrap();
        assert_ne!(a.state_hash().unwrap(), c.state_hash().unwrap());
    }

    #[test]
    fn test_new_period_view() {
        let data = SynchronizedData::with_participants(["a"])
            .update(ALL_PARTICIPANTS_KEY, &["a", "b"])
            .unwrap()
            .update("result", &1)
            .unwrap();
        let next = data.new_period(&BTreeSet::new());

        assert_eq!(next.period_count(), 1);
        assert_eq!(next.nb_participants().unwrap(), 1);
        assert_eq!(next.max_participants().unwrap(), 2);
        assert!(!next.db().contains("result"));
    }

    proptest::proptest! {
        #[test]
        fn prop_consensus_threshold_is_a_bft_quorum(n in 1usize..1000) {
            let threshold = consensus_threshold(n);
            proptest::prop_assert!(threshold <= n);
            proptest::prop_assert!(3 * threshold > 2 * n);
            proptest::prop_assert!(3 * (threshold - 1) <= 2 * n);
        }
    }
}
