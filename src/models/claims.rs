use serde::{Deserialize, Serialize};

use crate::models::session::Role;

/// Which of the two independently stored tokens an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims embedded in a token payload.
///
/// Access tokens carry the full identity set; refresh tokens carry only
/// `sub`, `type: "refresh"`, and the timing fields. `iat`/`exp` are epoch
/// milliseconds and always satisfy `exp = iat + ttl` for the token's kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    /// Subject (user id)
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    /// `"refresh"` on refresh tokens, absent on access tokens.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Issued-at (epoch milliseconds)
    pub iat: i64,
    /// Expiry (epoch milliseconds)
    pub exp: i64,
    /// Unique id for this token
    pub jti: String,
}
