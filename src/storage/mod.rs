pub mod memory;

pub use memory::MemoryStore;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::AppResult;

/// Well-known storage slots. Every component addresses the store through
/// these, so a fresh `MemoryStore` plus `seed_data` reproduces a complete
/// profile.
pub mod keys {
    pub const SESSION: &str = "vb_bank_session";
    pub const ACCESS_TOKEN: &str = "vb_bank_token";
    pub const REFRESH_TOKEN: &str = "vb_bank_refresh_token";
    pub const USERS: &str = "vb_bank_users";
    pub const TRANSACTIONS: &str = "vb_bank_transactions";
    pub const SEEDED: &str = "vb_bank_seeded";
    pub const SCHEMA_VERSION: &str = "vb_bank_schema_version";
}

/// Key→JSON-blob storage in the shape of browser local storage.
///
/// Reads and writes are individually atomic but read-modify-write sequences
/// are not; that is safe here because all access happens from one process.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

/// Read a slot and deserialize it. An unreadable value is treated as absent
/// (and logged) rather than surfaced, matching how a browser app treats a
/// corrupted local-storage entry.
pub fn get_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(key, %error, "stored value failed to deserialize, treating as absent");
            None
        }
    }
}

pub fn set_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> AppResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, raw);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_roundtrip() {
        let store = MemoryStore::new();
        set_json(&store, "k", &vec![1, 2, 3]).expect("set");
        let back: Option<Vec<i32>> = get_json(&store, "k");
        assert_eq!(back, Some(vec![1, 2, 3]));
    }

    #[test]
    fn corrupted_value_reads_as_absent() {
        let store = MemoryStore::new();
        store.set("k", "not json".to_string());
        let back: Option<Vec<i32>> = get_json(&store, "k");
        assert_eq!(back, None);
    }
}
