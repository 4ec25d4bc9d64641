use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Bounded record of inbound message ids, used to drop provider re-deliveries.
/// Once full, the oldest id is forgotten first.
pub struct SeenMessages {
    ids: Mutex<LruCache<String, ()>>,
}

impl SeenMessages {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            ids: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Records `id` and returns `true` the first time it is seen.
    pub fn first_delivery(&self, id: &str) -> bool {
        let mut ids = self.ids.lock();
        // peek: a repeat must not refresh the entry's age
        if ids.peek(id).is_some() {
            return false;
        }
        ids.put(id.to_string(), ());
        true
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_delivery_detected() {
        let seen = SeenMessages::new(500);
        assert!(seen.first_delivery("wamid.ABC"));
        assert!(!seen.first_delivery("wamid.ABC"));
        assert!(seen.first_delivery("wamid.DEF"));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_oldest_forgotten_first() {
        let seen = SeenMessages::new(2);
        seen.first_delivery("1");
        seen.first_delivery("2");
        assert!(!seen.first_delivery("1"));
        seen.first_delivery("3");

        assert_eq!(seen.len(), 2);
        assert!(seen.first_delivery("1"));
        assert!(!seen.first_delivery("3"));
    }
}
