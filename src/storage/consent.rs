//! The consolidated consent record.
//!
//! One JSON value under one key: `{necessary, analytics, marketing,
//! timestamp}`. `necessary` is always true. The client implements no
//! telemetry, but the record's shape and persistence are part of the
//! product contract and the banner shows until a decision exists.

use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::kv::KvStore;

const CONSENT_KEY: &str = "consent";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub necessary: bool,
    pub analytics: bool,
    pub marketing: bool,
    /// Unix seconds of the decision.
    pub timestamp: i64,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl ConsentRecord {
    pub fn accept_all() -> Self {
        Self::custom(true, false)
    }

    pub fn necessary_only() -> Self {
        Self::custom(false, false)
    }

    pub fn custom(analytics: bool, marketing: bool) -> Self {
        Self {
            necessary: true,
            analytics,
            marketing,
            timestamp: unix_now(),
        }
    }
}

pub struct ConsentStore {
    store: Rc<dyn KvStore>,
}

impl ConsentStore {
    pub fn new(store: Rc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// The stored decision, if a valid one exists. A corrupt record reads
    /// as "no decision yet" so the banner simply shows again.
    pub fn load(&self) -> Option<ConsentRecord> {
        let raw = match self.store.get(CONSENT_KEY) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(error = ?err, "Failed to read consent record");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(error = ?err, "Discarding malformed consent record");
                None
            }
        }
    }

    pub fn save(&self, record: &ConsentRecord) {
        match serde_json::to_string(record) {
            Ok(raw) => {
                if let Err(err) = self.store.set(CONSENT_KEY, &raw) {
                    warn!(error = ?err, "Failed to persist consent record");
                }
            }
            Err(err) => warn!(error = ?err, "Failed to encode consent record"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn consent_store() -> (Rc<MemoryStore>, ConsentStore) {
        let store = Rc::new(MemoryStore::new());
        (store.clone(), ConsentStore::new(store))
    }

    #[test]
    fn test_roundtrip() {
        let (_, consent) = consent_store();
        assert!(consent.load().is_none());

        let record = ConsentRecord::custom(true, false);
        consent.save(&record);
        assert_eq!(consent.load(), Some(record));
    }

    #[test]
    fn test_necessary_is_always_true() {
        assert!(ConsentRecord::accept_all().necessary);
        assert!(ConsentRecord::necessary_only().necessary);
        assert!(ConsentRecord::custom(false, true).necessary);
    }

    #[test]
    fn test_malformed_record_reads_as_absent() {
        let (store, consent) = consent_store();
        store.set(CONSENT_KEY, "{not json").unwrap();
        assert!(consent.load().is_none());
    }
}
