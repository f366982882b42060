//! Bearer-token lifecycle: issue, verify, refresh, proactive renewal.
//!
//! Tokens are JWT-shaped (`base64(header).base64(payload).signature`) but the
//! signature is a deterministic 32-bit fold of the payload text and a fixed
//! per-kind secret. This is NOT a security mechanism, purely demo theater;
//! swapping the fold for HMAC-SHA256 would leave every public contract here
//! unchanged.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::AppResult;
use crate::models::claims::{TokenClaims, TokenKind};
use crate::models::session::Session;
use crate::storage::{KeyValueStore, get_json, keys};
use crate::utils::clock::Clock;
use crate::utils::ids::random_suffix;

const ACCESS_SECRET: &str = "vb-bank-access-secret-key-2026";
const REFRESH_SECRET: &str = "vb-bank-refresh-secret-key-2026";

pub const ACCESS_TOKEN_TTL_MS: i64 = 15 * 60 * 1000;
pub const REFRESH_TOKEN_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Access tokens this close to expiry are renewed proactively.
const REFRESH_AHEAD_MS: i64 = 2 * 60 * 1000;

/// Outcome of a single verification. Fails closed: any structural problem
/// (segment count, undecodable payload, signature mismatch) reports neither
/// valid nor expired and carries no payload. A well-formed but out-of-date
/// token keeps its payload so callers can read stale claims.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenVerification {
    pub valid: bool,
    pub expired: bool,
    pub payload: Option<TokenClaims>,
}

impl TokenVerification {
    fn malformed() -> Self {
        Self {
            valid: false,
            expired: false,
            payload: None,
        }
    }
}

/// Token pair handed out on login/registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
    pub token_type: String,
}

/// Replacement access token minted by a successful refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedAccess {
    pub access_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

/// Diagnostic snapshot of both stored tokens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    pub access_valid: bool,
    pub access_expired: bool,
    pub refresh_valid: bool,
    pub refresh_expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_payload: Option<TokenClaims>,
}

pub struct TokenService {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Issue a fresh access/refresh pair for a session, overwriting any
    /// stored pair.
    pub fn issue(&self, session: &Session) -> AppResult<IssuedTokens> {
        let now = self.clock.now_ms();

        let access_claims = TokenClaims {
            sub: session.user_id.clone(),
            username: Some(session.username.clone()),
            role: Some(session.role),
            full_name: Some(session.full_name.clone()),
            email: Some(session.email.clone()),
            account_number: Some(session.account_number.clone()),
            token_type: None,
            iat: now,
            exp: now + ACCESS_TOKEN_TTL_MS,
            jti: generate_jti(now),
        };
        let refresh_claims = TokenClaims {
            sub: session.user_id.clone(),
            username: None,
            role: None,
            full_name: None,
            email: None,
            account_number: None,
            token_type: Some("refresh".to_string()),
            iat: now,
            exp: now + REFRESH_TOKEN_TTL_MS,
            jti: generate_jti(now),
        };

        let access_token = create_token(&access_claims, ACCESS_SECRET)?;
        let refresh_token = create_token(&refresh_claims, REFRESH_SECRET)?;

        self.store.set(keys::ACCESS_TOKEN, access_token.clone());
        self.store.set(keys::REFRESH_TOKEN, refresh_token.clone());

        debug!(sub = %session.user_id, "tokens_issued");

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            expires_in: ACCESS_TOKEN_TTL_MS / 1000,
            token_type: "Bearer".to_string(),
        })
    }

    /// Verify a token string against the given kind's secret and the current
    /// clock.
    pub fn verify(&self, token: &str, kind: TokenKind) -> TokenVerification {
        verify_token(token, secret_for(kind), self.clock.now_ms())
    }

    /// Verify whichever token of this kind is currently stored.
    pub fn verify_stored(&self, kind: TokenKind) -> TokenVerification {
        match self.store.get(storage_key_for(kind)) {
            Some(token) => self.verify(&token, kind),
            None => TokenVerification::malformed(),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.store.get(keys::ACCESS_TOKEN)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.store.get(keys::REFRESH_TOKEN)
    }

    /// Mint a replacement access token off the stored refresh token.
    ///
    /// Claims are rebuilt from the current session rather than decoded from
    /// the refresh token; a valid refresh token with no session is treated as
    /// unusable. Either failure clears both tokens, so one failed refresh
    /// fully logs the profile out.
    pub fn refresh(&self) -> Option<RefreshedAccess> {
        let check = self.verify_stored(TokenKind::Refresh);
        if !check.valid {
            warn!(expired = check.expired, "refresh_token_unusable_clearing");
            self.clear();
            return None;
        }

        let Some(session) = get_json::<Session>(self.store.as_ref(), keys::SESSION) else {
            warn!("refresh_token_valid_but_no_session_clearing");
            self.clear();
            return None;
        };

        let now = self.clock.now_ms();
        let claims = TokenClaims {
            sub: session.user_id.clone(),
            username: Some(session.username.clone()),
            role: Some(session.role),
            full_name: Some(session.full_name.clone()),
            email: Some(session.email.clone()),
            account_number: Some(session.account_number.clone()),
            token_type: None,
            iat: now,
            exp: now + ACCESS_TOKEN_TTL_MS,
            jti: generate_jti(now),
        };

        let access_token = match create_token(&claims, ACCESS_SECRET) {
            Ok(token) => token,
            Err(error) => {
                warn!(%error, "access_token_mint_failed");
                return None;
            }
        };
        self.store.set(keys::ACCESS_TOKEN, access_token.clone());

        debug!(sub = %session.user_id, "access_token_refreshed");

        Some(RefreshedAccess {
            access_token,
            expires_in: ACCESS_TOKEN_TTL_MS / 1000,
            token_type: "Bearer".to_string(),
        })
    }

    /// A usable access token, renewing proactively inside the 2-minute
    /// window and falling back to one silent refresh when expired. `None`
    /// means both tokens are spent.
    pub fn valid_access_token(&self) -> Option<String> {
        let token = self.access_token();
        let check = match token.as_deref() {
            Some(t) => self.verify(t, TokenKind::Access),
            None => TokenVerification::malformed(),
        };

        if check.valid {
            if let Some(payload) = &check.payload {
                if payload.exp - self.clock.now_ms() < REFRESH_AHEAD_MS {
                    if let Some(renewed) = self.refresh() {
                        return Some(renewed.access_token);
                    }
                }
            }
            return token;
        }

        if check.expired {
            if let Some(renewed) = self.refresh() {
                return Some(renewed.access_token);
            }
        }

        None
    }

    /// `Bearer <token>` for the network layer, or `None` when logged out.
    pub fn auth_header(&self) -> Option<String> {
        self.valid_access_token()
            .map(|token| format!("Bearer {}", token))
    }

    /// Drop both tokens. Used on logout and whenever a refresh fails.
    pub fn clear(&self) {
        self.store.remove(keys::ACCESS_TOKEN);
        self.store.remove(keys::REFRESH_TOKEN);
    }

    /// Read a token's claims without checking signature or expiry.
    pub fn decode_unverified(&self, token: &str) -> Option<TokenClaims> {
        let payload_json = decode_segment(token.split('.').nth(1)?)?;
        serde_json::from_str(&payload_json).ok()
    }

    pub fn token_info(&self) -> TokenInfo {
        let access = self.verify_stored(TokenKind::Access);
        let refresh = self.verify_stored(TokenKind::Refresh);
        TokenInfo {
            has_access_token: self.access_token().is_some(),
            has_refresh_token: self.refresh_token().is_some(),
            access_valid: access.valid,
            access_expired: access.expired,
            refresh_valid: refresh.valid,
            refresh_expired: refresh.expired,
            access_payload: access.payload,
        }
    }
}

fn secret_for(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Access => ACCESS_SECRET,
        TokenKind::Refresh => REFRESH_SECRET,
    }
}

fn storage_key_for(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Access => keys::ACCESS_TOKEN,
        TokenKind::Refresh => keys::REFRESH_TOKEN,
    }
}

fn generate_jti(now_ms: i64) -> String {
    format!("{}_{}", now_ms, random_suffix(8))
}

/// Deterministic non-cryptographic signature: a wrapping 32-bit fold of
/// `<payload json>.<secret>`, rendered base-36.
fn sign(payload_json: &str, secret: &str) -> String {
    let input = format!("{}.{}", payload_json, secret);
    let mut hash: i32 = 0;
    for c in input.chars() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(c as i32);
    }
    to_base36(u64::from(hash.unsigned_abs()))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

fn decode_segment(segment: &str) -> Option<String> {
    let bytes = BASE64.decode(segment).ok()?;
    String::from_utf8(bytes).ok()
}

fn create_token(claims: &TokenClaims, secret: &str) -> AppResult<String> {
    let header = serde_json::json!({"alg": "HS256", "typ": "JWT"});
    let header_b64 = BASE64.encode(serde_json::to_string(&header)?);
    let payload_json = serde_json::to_string(claims)?;
    let payload_b64 = BASE64.encode(&payload_json);
    // Sign the payload text itself so verification never depends on
    // re-serialization producing identical bytes.
    let signature = sign(&payload_json, secret);
    Ok(format!("{}.{}.{}", header_b64, payload_b64, signature))
}

fn verify_token(token: &str, secret: &str, now_ms: i64) -> TokenVerification {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return TokenVerification::malformed();
    }

    let Some(payload_json) = decode_segment(parts[1]) else {
        return TokenVerification::malformed();
    };

    if sign(&payload_json, secret) != parts[2] {
        return TokenVerification::malformed();
    }

    let Ok(payload) = serde_json::from_str::<TokenClaims>(&payload_json) else {
        return TokenVerification::malformed();
    };

    if now_ms > payload.exp {
        return TokenVerification {
            valid: false,
            expired: true,
            payload: Some(payload),
        };
    }

    TokenVerification {
        valid: true,
        expired: false,
        payload: Some(payload),
    }
}
