use chrono::TimeZone;
use chrono::Utc;
use tracing::info;

use crate::error::AppResult;
use crate::models::session::Role;
use crate::models::user::{Transaction, User};
use crate::storage::{KeyValueStore, keys, set_json};

const CURRENT_SCHEMA_VERSION: &str = "1";

/// Populate a fresh store with demo users and an empty transaction log.
///
/// Idempotent: a store already seeded at the current schema version is left
/// untouched. A version mismatch purges derived state (session, tokens)
/// before reseeding.
pub fn seed_data(store: &dyn KeyValueStore) -> AppResult<()> {
    let stored_version = store.get(keys::SCHEMA_VERSION);
    let is_seeded = store.get(keys::SEEDED).is_some();

    if is_seeded && stored_version.as_deref() == Some(CURRENT_SCHEMA_VERSION) {
        return Ok(());
    }

    if is_seeded {
        info!(
            stored_version = stored_version.as_deref().unwrap_or("<none>"),
            current_version = CURRENT_SCHEMA_VERSION,
            "seed_schema_mismatch_purging"
        );
        for key in [
            keys::SESSION,
            keys::ACCESS_TOKEN,
            keys::REFRESH_TOKEN,
            keys::USERS,
            keys::TRANSACTIONS,
        ] {
            store.remove(key);
        }
    }

    let users = demo_users();
    set_json(store, keys::USERS, &users)?;
    set_json(store, keys::TRANSACTIONS, &Vec::<Transaction>::new())?;
    store.set(keys::SCHEMA_VERSION, CURRENT_SCHEMA_VERSION.to_string());
    store.set(keys::SEEDED, "true".to_string());

    info!(users = users.len(), "seed_data_applied");
    Ok(())
}

fn demo_users() -> Vec<User> {
    let opened = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).single().unwrap_or_else(Utc::now);
    vec![
        User {
            id: "user_001".to_string(),
            username: "john.doe".to_string(),
            password: "user123".to_string(),
            email: "john.doe@example.com".to_string(),
            full_name: "John Doe".to_string(),
            role: Role::User,
            account_number: "1234567890".to_string(),
            balance: 15_000.0,
            currency: "USD".to_string(),
            created_at: opened,
        },
        User {
            id: "user_002".to_string(),
            username: "jane.smith".to_string(),
            password: "user456".to_string(),
            email: "jane.smith@example.com".to_string(),
            full_name: "Jane Smith".to_string(),
            role: Role::User,
            account_number: "9876543210".to_string(),
            balance: 8_200.0,
            currency: "USD".to_string(),
            created_at: opened,
        },
        User {
            id: "admin_001".to_string(),
            username: "admin".to_string(),
            password: "admin123".to_string(),
            email: "admin@vbbank.example".to_string(),
            full_name: "Site Administrator".to_string(),
            role: Role::Admin,
            account_number: "5555666677".to_string(),
            balance: 50_000.0,
            currency: "USD".to_string(),
            created_at: opened,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, get_json};

    #[test]
    fn seeds_users_and_empty_transactions() {
        let store = MemoryStore::new();
        seed_data(&store).expect("seed");

        let users: Vec<User> = get_json(&store, keys::USERS).expect("users present");
        assert_eq!(users.len(), 3);
        assert!(users.iter().any(|u| u.role == Role::Admin));

        let txns: Vec<Transaction> = get_json(&store, keys::TRANSACTIONS).expect("txns present");
        assert!(txns.is_empty());
    }

    #[test]
    fn reseeding_is_a_no_op() {
        let store = MemoryStore::new();
        seed_data(&store).expect("seed");

        // Mutate a balance, then seed again: the mutation must survive.
        let mut users: Vec<User> = get_json(&store, keys::USERS).expect("users");
        users[0].balance = 1.0;
        set_json(&store, keys::USERS, &users).expect("set");

        seed_data(&store).expect("seed again");
        let users: Vec<User> = get_json(&store, keys::USERS).expect("users");
        assert_eq!(users[0].balance, 1.0);
    }

    #[test]
    fn version_mismatch_purges_and_reseeds() {
        let store = MemoryStore::new();
        seed_data(&store).expect("seed");
        store.set(keys::SCHEMA_VERSION, "0".to_string());
        store.set(keys::SESSION, "{}".to_string());

        seed_data(&store).expect("reseed");
        assert_eq!(store.get(keys::SESSION), None);
        assert_eq!(
            store.get(keys::SCHEMA_VERSION),
            Some(CURRENT_SCHEMA_VERSION.to_string())
        );
    }
}
