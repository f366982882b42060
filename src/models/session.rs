use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// The single active login for this store. Created on successful
/// login/registration, destroyed on logout; at most one exists at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub account_number: String,
    pub login_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let session = Session {
            user_id: "user_001".to_string(),
            username: "john.doe".to_string(),
            full_name: "John Doe".to_string(),
            email: "john.doe@example.com".to_string(),
            role: Role::User,
            account_number: "1234567890".to_string(),
            login_time: Utc::now(),
        };

        let value = serde_json::to_value(&session).expect("serialize");
        assert_eq!(value["userId"], "user_001");
        assert_eq!(value["fullName"], "John Doe");
        assert_eq!(value["accountNumber"], "1234567890");
        assert_eq!(value["role"], "user");
        assert!(value["loginTime"].is_string());
    }
}
