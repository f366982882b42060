//! Login, registration, and session management against the injected store.
//! All failures here are domain-level: they surface as 400-class envelope
//! errors, never as 500s.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::session::{Role, Session};
use crate::models::user::User;
use crate::services::{DomainError, DomainResult};
use crate::storage::{KeyValueStore, get_json, keys, set_json};
use crate::utils::ids::{account_number, entity_id};

pub struct AuthService {
    store: Arc<dyn KeyValueStore>,
}

/// Fields a user may change about themselves. Identity, role, and account
/// number are immutable.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl AuthService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn current_session(&self) -> Option<Session> {
        get_json(self.store.as_ref(), keys::SESSION)
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_session().is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.current_session()
            .map(|session| session.role == Role::Admin)
            .unwrap_or(false)
    }

    fn users(&self) -> Vec<User> {
        get_json(self.store.as_ref(), keys::USERS).unwrap_or_default()
    }

    fn save_users(&self, users: &[User]) -> DomainResult<()> {
        set_json(self.store.as_ref(), keys::USERS, &users)?;
        Ok(())
    }

    fn set_session(&self, user: &User) -> DomainResult<Session> {
        let session = Session {
            user_id: user.id.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            role: user.role,
            account_number: user.account_number.clone(),
            login_time: Utc::now(),
        };
        set_json(self.store.as_ref(), keys::SESSION, &session)?;
        Ok(session)
    }

    pub fn login(&self, username: &str, password: &str) -> DomainResult<Session> {
        let users = self.users();
        let user = users
            .iter()
            .find(|u| u.username == username && u.password == password)
            .ok_or(DomainError::InvalidCredentials)?;

        let session = self.set_session(user)?;
        info!(user_id = %session.user_id, "login_succeeded");
        Ok(session)
    }

    /// Create a new user with a generated account number and zero opening
    /// balance, then log them in.
    pub fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
        full_name: &str,
    ) -> DomainResult<Session> {
        let mut users = self.users();

        if users.iter().any(|u| u.username == username) {
            return Err(DomainError::UsernameTaken);
        }
        if users.iter().any(|u| u.email == email) {
            return Err(DomainError::EmailTaken);
        }

        let user = User {
            id: entity_id("user"),
            username: username.to_string(),
            password: password.to_string(),
            email: email.to_string(),
            full_name: full_name.to_string(),
            // New registrations are always plain users.
            role: Role::User,
            account_number: account_number(),
            balance: 0.0,
            currency: "USD".to_string(),
            created_at: Utc::now(),
        };
        users.push(user.clone());
        self.save_users(&users)?;

        let session = self.set_session(&user)?;
        info!(user_id = %session.user_id, "registration_succeeded");
        Ok(session)
    }

    pub fn logout(&self) {
        self.store.remove(keys::SESSION);
        debug!("session_destroyed");
    }

    pub fn user_by_id(&self, user_id: &str) -> Option<User> {
        self.users().into_iter().find(|u| u.id == user_id)
    }

    pub fn update_profile(&self, user_id: &str, updates: &Value) -> DomainResult<User> {
        let updates: ProfileUpdate = serde_json::from_value(updates.clone())
            .map_err(|e| DomainError::InvalidUpdate(e.to_string()))?;

        let mut users = self.users();
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(DomainError::UserNotFound)?;

        if let Some(full_name) = updates.full_name {
            user.full_name = full_name;
        }
        if let Some(email) = updates.email {
            user.email = email;
        }
        if let Some(password) = updates.password {
            user.password = password;
        }

        let updated = user.clone();
        self.save_users(&users)?;

        // Keep the session in line when the current user edits themselves.
        if let Some(session) = self.current_session() {
            if session.user_id == user_id {
                self.set_session(&updated)?;
            }
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::utils::seeder::seed_data;
    use pretty_assertions::assert_eq;

    fn service() -> AuthService {
        let store = Arc::new(MemoryStore::new());
        seed_data(store.as_ref()).expect("seed");
        AuthService::new(store)
    }

    #[test]
    fn login_with_valid_credentials_creates_session() {
        let auth = service();
        let session = auth.login("john.doe", "user123").expect("login");
        assert_eq!(session.user_id, "user_001");
        assert_eq!(auth.current_session(), Some(session));
        assert!(auth.is_authenticated());
        assert!(!auth.is_admin());
    }

    #[test]
    fn login_with_wrong_password_fails_without_session() {
        let auth = service();
        let err = auth.login("john.doe", "wrong").expect_err("must fail");
        assert!(matches!(err, DomainError::InvalidCredentials));
        assert!(auth.current_session().is_none());
    }

    #[test]
    fn register_rejects_duplicate_username_and_email() {
        let auth = service();
        let taken = auth.register("john.doe", "pw", "new@example.com", "New User");
        assert!(matches!(taken, Err(DomainError::UsernameTaken)));

        let taken = auth.register("new.user", "pw", "john.doe@example.com", "New User");
        assert!(matches!(taken, Err(DomainError::EmailTaken)));
    }

    #[test]
    fn register_creates_zero_balance_user_and_logs_in() {
        let auth = service();
        let session = auth
            .register("new.user", "pw12345", "new@example.com", "New User")
            .expect("register");

        assert_eq!(session.role, Role::User);
        assert_eq!(session.account_number.len(), 10);

        let user = auth.user_by_id(&session.user_id).expect("stored");
        assert_eq!(user.balance, 0.0);
        assert_eq!(auth.current_session().map(|s| s.user_id), Some(user.id));
    }

    #[test]
    fn logout_destroys_session() {
        let auth = service();
        auth.login("john.doe", "user123").expect("login");
        auth.logout();
        assert!(!auth.is_authenticated());
    }

    #[test]
    fn update_profile_pins_immutable_fields() {
        let auth = service();
        auth.login("john.doe", "user123").expect("login");

        let err = auth
            .update_profile("user_001", &serde_json::json!({"role": "admin"}))
            .expect_err("must reject");
        assert!(matches!(err, DomainError::InvalidUpdate(_)));

        let updated = auth
            .update_profile("user_001", &serde_json::json!({"fullName": "Johnny Doe"}))
            .expect("update");
        assert_eq!(updated.full_name, "Johnny Doe");
        assert_eq!(updated.account_number, "1234567890");

        // Session follows the profile change.
        assert_eq!(
            auth.current_session().map(|s| s.full_name),
            Some("Johnny Doe".to_string())
        );
    }

    #[test]
    fn admin_user_is_recognized() {
        let auth = service();
        auth.login("admin", "admin123").expect("login");
        assert!(auth.is_admin());
    }
}
