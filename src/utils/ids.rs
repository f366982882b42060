use rand::Rng;
use uuid::Uuid;

const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Short random alphanumeric suffix for request ids and token ids.
pub fn random_suffix(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..SUFFIX_CHARSET.len());
            SUFFIX_CHARSET[idx] as char
        })
        .collect()
}

/// Prefixed unique id for domain entities, e.g. `txn_<uuid>`.
pub fn entity_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4())
}

/// 10-digit account number for newly registered users.
pub fn account_number() -> String {
    let mut rng = rand::rng();
    rng.random_range(1_000_000_000u64..10_000_000_000u64).to_string()
}
