//! Authentication endpoints.

use serde_json::{Value, json};

use super::{BankClient, outcome};
use crate::error::AppResult;
use crate::models::envelope::ResponseEnvelope;
use crate::models::session::Session;
use crate::services::mock_api::{HandlerOutcome, RequestOptions};
use crate::services::token_service::IssuedTokens;

fn session_with_tokens(session: &Session, tokens: &IssuedTokens) -> AppResult<Value> {
    let mut data = serde_json::to_value(tokens)?;
    data["user"] = serde_json::to_value(session)?;
    Ok(data)
}

impl BankClient {
    /// `POST /api/auth/login`
    ///
    /// The network-visible body carries a pre-masked password on top of the
    /// sanitizer's own masking.
    pub async fn login(&self, username: &str, password: &str) -> ResponseEnvelope {
        self.api
            .post(
                "/api/auth/login",
                || match self.auth.login(username, password) {
                    Ok(session) => {
                        let tokens = self.tokens.issue(&session)?;
                        Ok(HandlerOutcome::ok(session_with_tokens(&session, &tokens)?))
                    }
                    Err(domain) => Ok(HandlerOutcome::fail_with_code(
                        "INVALID_CREDENTIALS",
                        domain.to_string(),
                    )),
                },
                RequestOptions::with_body(json!({
                    "username": username,
                    "password": "********",
                })),
            )
            .await
    }

    /// `POST /api/auth/register`
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
        full_name: &str,
    ) -> ResponseEnvelope {
        self.api
            .post(
                "/api/auth/register",
                || match self.auth.register(username, password, email, full_name) {
                    Ok(session) => {
                        let tokens = self.tokens.issue(&session)?;
                        Ok(HandlerOutcome::ok(session_with_tokens(&session, &tokens)?))
                    }
                    Err(domain) => Ok(HandlerOutcome::fail_with_code(
                        "REGISTRATION_FAILED",
                        domain.to_string(),
                    )),
                },
                RequestOptions::with_body(json!({
                    "fullName": full_name,
                    "username": username,
                    "email": email,
                })),
            )
            .await
    }

    /// `POST /api/auth/logout`. Destroys the session and both tokens.
    pub async fn logout(&self) -> ResponseEnvelope {
        self.api
            .post(
                "/api/auth/logout",
                || {
                    self.auth.logout();
                    self.tokens.clear();
                    Ok(HandlerOutcome::ok(json!({
                        "message": "Logged out successfully"
                    })))
                },
                RequestOptions::default(),
            )
            .await
    }

    /// `GET /api/auth/session`. Instant, no simulated latency.
    pub async fn session(&self) -> ResponseEnvelope {
        self.api
            .get(
                "/api/auth/session",
                || match self.auth.current_session() {
                    Some(session) => Ok(HandlerOutcome::ok(serde_json::to_value(session)?)),
                    None => Ok(HandlerOutcome::fail_with_code(
                        "UNAUTHORIZED",
                        "No active session",
                    )),
                },
                RequestOptions::instant(),
            )
            .await
    }

    /// `POST /api/auth/refresh`
    pub async fn refresh_token(&self) -> ResponseEnvelope {
        self.api
            .post(
                "/api/auth/refresh",
                || match self.tokens.valid_access_token() {
                    Some(access_token) => Ok(HandlerOutcome::ok(json!({
                        "accessToken": access_token,
                        "tokenType": "Bearer",
                    }))),
                    None => Ok(HandlerOutcome::fail_with_code(
                        "REFRESH_EXPIRED",
                        "Refresh token expired",
                    )),
                },
                RequestOptions::default(),
            )
            .await
    }

    /// `PUT /api/auth/profile`
    pub async fn update_profile(&self, user_id: &str, updates: Value) -> ResponseEnvelope {
        let mut body = json!({ "userId": user_id });
        if let (Some(target), Some(source)) = (body.as_object_mut(), updates.as_object()) {
            for (key, value) in source {
                target.insert(key.clone(), value.clone());
            }
        }

        self.api
            .put(
                "/api/auth/profile",
                || outcome(self.auth.update_profile(user_id, &updates), "BAD_REQUEST"),
                RequestOptions::with_body(body),
            )
            .await
    }
}
