//! Masking of sensitive fields before they reach the network-visible
//! transcript. The application itself always works on the unmasked data;
//! only the copies handed to the network layer pass through here.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Fields whose values are replaced wholesale with a fixed-length mask.
static FULL_REDACT_FIELDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "password",
        "currentpassword",
        "newpassword",
        "pin",
        "ssn",
        "socialsecuritynumber",
        "passportnumber",
        "driverslicense",
    ])
});

/// Fields that keep their last four characters.
static PARTIAL_MASK_FIELDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "accesstoken",
        "refreshtoken",
        "token",
        "accountnumber",
        "recipientaccount",
        "cardnumber",
    ])
});

const FULL_MASK: &str = "********";
const SHORT_MASK: &str = "****";

fn is_sensitive(lower_key: &str) -> bool {
    FULL_REDACT_FIELDS.contains(lower_key) || PARTIAL_MASK_FIELDS.contains(lower_key)
}

/// Mask a single leaf according to its field name. Only string and number
/// leaves are masked; anything else passes through unchanged.
fn mask_value(lower_key: &str, value: &Value) -> Value {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return value.clone(),
    };

    if FULL_REDACT_FIELDS.contains(lower_key) {
        return Value::String(FULL_MASK.to_string());
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= 4 {
        return Value::String(SHORT_MASK.to_string());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    Value::String(format!("{}{}", "*".repeat(chars.len() - 4), tail))
}

/// Deep-copy a value with all sensitive fields masked. The input is never
/// mutated.
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        Value::Object(fields) => {
            let mut sanitized = Map::with_capacity(fields.len());
            for (key, field_value) in fields {
                let lower = key.to_lowercase();
                if is_sensitive(&lower) {
                    sanitized.insert(key.clone(), mask_value(&lower, field_value));
                } else if field_value.is_object() || field_value.is_array() {
                    sanitized.insert(key.clone(), sanitize(field_value));
                } else {
                    sanitized.insert(key.clone(), field_value.clone());
                }
            }
            Value::Object(sanitized)
        }
        other => other.clone(),
    }
}

/// Mask a `Bearer` header value for display: first ten characters of the
/// token survive, the tail is elided. Non-bearer headers pass through.
pub fn mask_auth_header(header: &str) -> String {
    let mut parts = header.splitn(2, ' ');
    let (scheme, token) = match (parts.next(), parts.next()) {
        (Some("Bearer"), Some(token)) if !token.contains(' ') => ("Bearer", token),
        _ => return header.to_string(),
    };

    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 16 {
        return format!("{} {}", scheme, "*".repeat(chars.len()));
    }
    let head: String = chars[..10].iter().collect();
    format!("{} {}...{}", scheme, head, "****")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn password_is_fully_redacted_and_original_untouched() {
        let original = json!({"password": "secret1"});
        let sanitized = sanitize(&original);

        assert_eq!(sanitized["password"], "********");
        assert_eq!(original["password"], "secret1");
    }

    #[test]
    fn account_number_keeps_last_four() {
        let sanitized = sanitize(&json!({"accountNumber": "1234567890"}));
        let masked = sanitized["accountNumber"].as_str().expect("string");
        assert_eq!(masked, "******7890");
        assert!(masked.ends_with("7890"));
        assert!(masked[..masked.len() - 4].chars().all(|c| c == '*'));
    }

    #[test]
    fn short_partial_values_collapse_to_four_stars() {
        let sanitized = sanitize(&json!({"cardNumber": "1234"}));
        assert_eq!(sanitized["cardNumber"], "****");
    }

    #[test]
    fn numbers_under_sensitive_keys_are_masked_as_strings() {
        let sanitized = sanitize(&json!({"pin": 4321, "accountNumber": 1234567890}));
        assert_eq!(sanitized["pin"], "********");
        assert_eq!(sanitized["accountNumber"], "******7890");
    }

    #[test]
    fn key_comparison_is_case_insensitive() {
        let sanitized = sanitize(&json!({"PassWord": "hunter2", "AccessToken": "abcdefghij"}));
        assert_eq!(sanitized["PassWord"], "********");
        assert_eq!(sanitized["AccessToken"], "******ghij");
    }

    #[test]
    fn recurses_into_nested_objects_and_arrays() {
        let original = json!({
            "users": [
                {"name": "a", "password": "pw-one"},
                {"name": "b", "nested": {"ssn": "123-45-6789"}}
            ],
            "count": 2
        });
        let sanitized = sanitize(&original);

        assert_eq!(sanitized["users"][0]["password"], "********");
        assert_eq!(sanitized["users"][0]["name"], "a");
        assert_eq!(sanitized["users"][1]["nested"]["ssn"], "********");
        assert_eq!(sanitized["count"], 2);
        // Input untouched
        assert_eq!(original["users"][0]["password"], "pw-one");
    }

    #[test]
    fn non_sensitive_values_pass_through() {
        let original = json!({"balance": 42.5, "note": "hello", "flag": true, "none": null});
        assert_eq!(sanitize(&original), original);
    }

    #[test]
    fn masks_bearer_header() {
        let masked = mask_auth_header("Bearer abcdefghijklmnopqrstuvwxyz");
        assert_eq!(masked, "Bearer abcdefghij...****");
    }

    #[test]
    fn short_bearer_tokens_are_fully_starred() {
        assert_eq!(mask_auth_header("Bearer abcd"), "Bearer ****");
    }

    #[test]
    fn non_bearer_headers_pass_through() {
        assert_eq!(mask_auth_header("Basic dXNlcg=="), "Basic dXNlcg==");
        assert_eq!(mask_auth_header("nonsense"), "nonsense");
    }

    fn arb_json(depth: u32) -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-zA-Z0-9 ]{0,16}".prop_map(Value::String),
        ];
        leaf.prop_recursive(depth, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::hash_map("[a-zA-Z]{1,12}", inner, 0..4).prop_map(|m| {
                    Value::Object(m.into_iter().collect())
                }),
            ]
        })
    }

    proptest! {
        /// Sanitizing never mutates its input, and running it twice is a
        /// fixed point.
        #[test]
        fn sanitize_is_pure_and_idempotent(value in arb_json(3)) {
            let before = value.clone();
            let once = sanitize(&value);
            prop_assert_eq!(&value, &before);
            let twice = sanitize(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
