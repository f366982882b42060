use dashmap::DashMap;

use super::KeyValueStore;

/// In-memory stand-in for browser local storage. One instance corresponds to
/// one browser profile; tests create as many independent profiles as needed.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: String) {
        self.inner.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.inner.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a"), None);

        store.set("a", "1".to_string());
        assert_eq!(store.get("a"), Some("1".to_string()));

        store.set("a", "2".to_string());
        assert_eq!(store.get("a"), Some("2".to_string()));

        store.remove("a");
        assert_eq!(store.get("a"), None);
        assert!(store.is_empty());
    }
}
