//! Cached album PINs, keyed per album.
//!
//! A cached PIN is a convenience, never an authority: it is re-verified
//! against the API on every album open and dropped on rejection. Storage
//! failures therefore only cost a re-prompt and are logged, not surfaced.

use std::rc::Rc;

use tracing::warn;

use super::kv::KvStore;

pub struct PinCache {
    store: Rc<dyn KvStore>,
}

fn pin_key(album_id: &str) -> String {
    format!("album_pin/{album_id}")
}

impl PinCache {
    pub fn new(store: Rc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn get(&self, album_id: &str) -> Option<String> {
        match self.store.get(&pin_key(album_id)) {
            Ok(pin) => pin,
            Err(err) => {
                warn!(album_id, error = ?err, "Failed to read cached PIN");
                None
            }
        }
    }

    pub fn remember(&self, album_id: &str, pin: &str) {
        if let Err(err) = self.store.set(&pin_key(album_id), pin) {
            warn!(album_id, error = ?err, "Failed to cache PIN");
        }
    }

    pub fn forget(&self, album_id: &str) {
        if let Err(err) = self.store.remove(&pin_key(album_id)) {
            warn!(album_id, error = ?err, "Failed to drop cached PIN");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_pins_are_namespaced_per_album() {
        let store: Rc<dyn KvStore> = Rc::new(MemoryStore::new());
        let cache = PinCache::new(store);

        cache.remember("9", "1234");
        cache.remember("12", "9876");

        assert_eq!(cache.get("9").as_deref(), Some("1234"));
        assert_eq!(cache.get("12").as_deref(), Some("9876"));
        assert_eq!(cache.get("7"), None);
    }

    #[test]
    fn test_forget_removes_only_one_album() {
        let store: Rc<dyn KvStore> = Rc::new(MemoryStore::new());
        let cache = PinCache::new(store);

        cache.remember("9", "1234");
        cache.remember("12", "9876");
        cache.forget("9");

        assert_eq!(cache.get("9"), None);
        assert_eq!(cache.get("12").as_deref(), Some("9876"));
    }
}
