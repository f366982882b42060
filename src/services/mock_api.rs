//! The request orchestrator: wraps a synchronous domain operation in a
//! REST-like envelope with simulated latency, token authentication, fault
//! injection, and network visibility. Every failure becomes an envelope at
//! this boundary; callers never see a raw error.

use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SimulationSettings;
use crate::error::AppResult;
use crate::models::claims::TokenKind;
use crate::models::envelope::{Method, ResponseEnvelope, ResponseMeta};
use crate::services::bridge::ResponseBridge;
use crate::services::fault::FaultPolicy;
use crate::services::sanitizer::{mask_auth_header, sanitize};
use crate::services::service_worker::{
    CORRELATION_HEADER, FetchOutcome, FetchRequest, PageHandle, PortMessage, ResolveMessage,
    WorkerHandle,
};
use crate::services::token_service::TokenService;
use crate::utils::ids::random_suffix;

/// Endpoints that do NOT require authentication.
pub const PUBLIC_ENDPOINTS: &[&str] = &[
    "/api/auth/login",
    "/api/auth/register",
    "/api/auth/refresh",
    "/api/auth/session",
];

const PAGE_LISTENER_CAPACITY: usize = 64;

/// What a domain handler reports back: either a payload or a domain-level
/// failure with an optional specific error code.
#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub error_code: Option<String>,
}

impl HandlerOutcome {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_code: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_code: None,
        }
    }

    pub fn fail_with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_code: Some(code.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Skip the simulated latency window (e.g. instant session checks).
    pub skip_delay: bool,
    /// Request body as shown to the network layer (after sanitizing).
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn with_body(body: Value) -> Self {
        Self {
            skip_delay: false,
            body: Some(body),
        }
    }

    pub fn instant() -> Self {
        Self {
            skip_delay: true,
            body: None,
        }
    }
}

pub struct MockApi {
    settings: Arc<RwLock<SimulationSettings>>,
    tokens: Arc<TokenService>,
    bridge: Arc<ResponseBridge>,
    faults: Arc<dyn FaultPolicy>,
    worker: Option<WorkerHandle>,
}

impl MockApi {
    pub fn new(
        settings: SimulationSettings,
        tokens: Arc<TokenService>,
        bridge: Arc<ResponseBridge>,
        faults: Arc<dyn FaultPolicy>,
        worker: Option<WorkerHandle>,
    ) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
            tokens,
            bridge,
            faults,
            worker,
        }
    }

    /// Adjust the simulation knobs at runtime. Rejected (and logged) when
    /// the mutation produces an invalid configuration.
    pub async fn configure(&self, mutate: impl FnOnce(&mut SimulationSettings)) {
        let mut settings = self.settings.write().await;
        let mut candidate = settings.clone();
        mutate(&mut candidate);
        match candidate.validate() {
            Ok(()) => *settings = candidate,
            Err(error) => warn!(%error, "settings_change_rejected"),
        }
    }

    pub async fn settings(&self) -> SimulationSettings {
        self.settings.read().await.clone()
    }

    pub fn bridge(&self) -> Arc<ResponseBridge> {
        self.bridge.clone()
    }

    pub fn worker(&self) -> Option<&WorkerHandle> {
        self.worker.as_ref()
    }

    pub async fn get<F>(&self, endpoint: &str, handler: F, options: RequestOptions) -> ResponseEnvelope
    where
        F: FnOnce() -> AppResult<HandlerOutcome>,
    {
        self.request(Method::Get, endpoint, handler, options).await
    }

    pub async fn post<F>(&self, endpoint: &str, handler: F, options: RequestOptions) -> ResponseEnvelope
    where
        F: FnOnce() -> AppResult<HandlerOutcome>,
    {
        self.request(Method::Post, endpoint, handler, options).await
    }

    pub async fn put<F>(&self, endpoint: &str, handler: F, options: RequestOptions) -> ResponseEnvelope
    where
        F: FnOnce() -> AppResult<HandlerOutcome>,
    {
        self.request(Method::Put, endpoint, handler, options).await
    }

    pub async fn delete<F>(&self, endpoint: &str, handler: F, options: RequestOptions) -> ResponseEnvelope
    where
        F: FnOnce() -> AppResult<HandlerOutcome>,
    {
        self.request(Method::Delete, endpoint, handler, options).await
    }

    /// Run one simulated request end to end. Each numbered step is a
    /// potential suspension point; all terminal paths funnel through the
    /// same delivery-and-return sequence.
    pub async fn request<F>(
        &self,
        method: Method,
        endpoint: &str,
        handler: F,
        options: RequestOptions,
    ) -> ResponseEnvelope
    where
        F: FnOnce() -> AppResult<HandlerOutcome>,
    {
        // 1. Correlation id for this request.
        let request_id = generate_request_id();
        let started = Instant::now();
        let settings = self.settings.read().await.clone();

        if settings.logging {
            debug!(request_id = %request_id, method = %method, endpoint, "mock_request_started");
        }

        // 2. Fire the network-visible fetch first so the inspector starts
        //    timing now; the worker blocks on it until we deliver.
        let fetch = self.start_network_fetch(&method, endpoint, &request_id, options.body.as_ref());

        // 3. Simulated latency.
        if !options.skip_delay {
            simulate_delay(&settings).await;
        }

        // 4. Authentication (with a single silent refresh).
        if let Some(envelope) = self.authenticate(endpoint, &request_id, &settings) {
            if settings.logging {
                warn!(request_id = %request_id, method = %method, endpoint, "mock_request_unauthorized");
            }
            return self.finish(envelope, fetch).await;
        }

        // 5. Injected server error.
        if self.faults.should_fail(settings.error_rate) {
            let envelope = ResponseEnvelope::fail(
                500,
                "INTERNAL_SERVER_ERROR",
                "An unexpected error occurred. Please try again.",
                ResponseMeta::new(&request_id)
                    .with_duration(elapsed_ms(started))
                    .with_call(method, endpoint),
            );
            if settings.logging {
                error!(request_id = %request_id, method = %method, endpoint, "mock_request_fault_injected");
            }
            return self.finish(envelope, fetch).await;
        }

        // 6/7. Domain handler; an Err is a programmer error surfaced as 500.
        let envelope = match handler() {
            Ok(outcome) => {
                let status = if outcome.success {
                    if method == Method::Post { 201 } else { 200 }
                } else {
                    400
                };
                let meta = ResponseMeta::new(&request_id)
                    .with_duration(elapsed_ms(started))
                    .with_call(method, endpoint);
                if outcome.success {
                    ResponseEnvelope::ok(status, outcome.data, meta)
                } else {
                    ResponseEnvelope::fail(
                        status,
                        outcome.error_code.unwrap_or_else(|| "BAD_REQUEST".to_string()),
                        outcome.error.unwrap_or_else(|| "Request failed".to_string()),
                        meta,
                    )
                }
            }
            Err(err) => ResponseEnvelope::fail(
                500,
                "SERVER_ERROR",
                err.to_string(),
                ResponseMeta::new(&request_id).with_duration(elapsed_ms(started)),
            ),
        };

        if settings.logging {
            let duration = envelope.meta.duration.unwrap_or_default();
            if envelope.success {
                info!(
                    request_id = %request_id,
                    method = %method,
                    endpoint,
                    status = envelope.status,
                    duration_ms = duration,
                    "mock_request_completed"
                );
            } else {
                warn!(
                    request_id = %request_id,
                    method = %method,
                    endpoint,
                    status = envelope.status,
                    code = envelope.error_code().unwrap_or(""),
                    duration_ms = duration,
                    "mock_request_failed"
                );
            }
        }

        // 8/9. Deliver the sanitized copy, let the fetch settle, hand the
        // full copy back.
        self.finish(envelope, fetch).await
    }

    /// Start the network-visible call without awaiting it. Body and
    /// authorization are masked before they leave the orchestrator.
    fn start_network_fetch(
        &self,
        method: &Method,
        endpoint: &str,
        request_id: &str,
        body: Option<&Value>,
    ) -> Option<JoinHandle<FetchOutcome>> {
        let worker = self.worker.as_ref()?;

        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            (CORRELATION_HEADER.to_string(), request_id.to_string()),
        ];
        if let Some(auth) = self.tokens.auth_header() {
            headers.push(("Authorization".to_string(), mask_auth_header(&auth)));
        }

        let request = FetchRequest {
            method: *method,
            path: endpoint.to_string(),
            headers,
            body: if method.is_bodyless() {
                None
            } else {
                body.map(sanitize)
            },
        };

        let handle = worker.clone();
        Some(tokio::spawn(async move { handle.fetch(request).await }))
    }

    fn authenticate(
        &self,
        endpoint: &str,
        request_id: &str,
        settings: &SimulationSettings,
    ) -> Option<ResponseEnvelope> {
        if PUBLIC_ENDPOINTS.iter().any(|prefix| endpoint.starts_with(prefix)) {
            return None;
        }

        let Some(token) = self.tokens.access_token() else {
            return Some(ResponseEnvelope::fail(
                401,
                "UNAUTHORIZED",
                "Authentication required. Please log in.",
                ResponseMeta::new(request_id),
            ));
        };

        let check = self.tokens.verify(&token, TokenKind::Access);
        if check.valid {
            return None;
        }

        if check.expired && self.tokens.refresh().is_some() {
            if settings.logging {
                debug!(request_id, endpoint, "token_auto_refreshed");
            }
            return None;
        }

        Some(ResponseEnvelope::fail(
            401,
            "TOKEN_EXPIRED",
            "Session expired. Please log in again.",
            ResponseMeta::new(request_id),
        ))
    }

    /// Common tail of every terminal path: deliver the sanitized copy for
    /// the network side, wait out the fetch, return the full envelope.
    async fn finish(
        &self,
        envelope: ResponseEnvelope,
        fetch: Option<JoinHandle<FetchOutcome>>,
    ) -> ResponseEnvelope {
        if self.worker.is_some() {
            self.bridge
                .deliver(&envelope.meta.request_id, sanitized_clone(&envelope));
        }
        if let Some(fetch) = fetch {
            let _ = fetch.await;
        }
        envelope
    }
}

/// Deep-copy an envelope with sensitive fields masked. The fallback keeps
/// the wire shape sane even if the round-trip ever fails: status and meta
/// survive, the payload does not.
fn sanitized_clone(envelope: &ResponseEnvelope) -> ResponseEnvelope {
    let result = serde_json::to_value(envelope)
        .map(|value| sanitize(&value))
        .and_then(serde_json::from_value::<ResponseEnvelope>);
    match result {
        Ok(sanitized) => sanitized,
        Err(err) => {
            error!(error = %err, "envelope_sanitize_roundtrip_failed");
            let mut stripped = envelope.clone();
            stripped.data = None;
            stripped
        }
    }
}

fn generate_request_id() -> String {
    format!("req_{}_{}", Utc::now().timestamp_millis(), random_suffix(6))
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

async fn simulate_delay(settings: &SimulationSettings) {
    let low = settings.min_delay_ms;
    let high = settings.max_delay_ms.max(low);
    let delay_ms = {
        let mut rng = rand::rng();
        rng.random_range(low..=high)
    };
    if delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

/// Spawn the page-side message listener: for every resolve inquiry from the
/// worker, consume the envelope from the bridge (waiting if it is not
/// computed yet) and answer over the private reply port.
pub fn spawn_page_listener(bridge: Arc<ResponseBridge>) -> PageHandle {
    let (tx, mut rx) = mpsc::channel::<ResolveMessage>(PAGE_LISTENER_CAPACITY);
    tokio::spawn(async move {
        while let Some(ResolveMessage { request_id, reply }) = rx.recv().await {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                let envelope = bridge.await_response(&request_id).await;
                let status = envelope.status;
                let body = match serde_json::to_value(&envelope) {
                    Ok(body) => body,
                    Err(err) => {
                        error!(request_id = %request_id, error = %err, "envelope_serialize_failed");
                        serde_json::json!({"success": false, "error": "Malformed envelope"})
                    }
                };
                let _ = reply.send(PortMessage { body, status });
            });
        }
        debug!("page_listener_stopped");
    });
    tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::session::{Role, Session};
    use crate::services::fault::{AlwaysFail, NoFaults};
    use crate::storage::{KeyValueStore, MemoryStore, keys, set_json};
    use crate::utils::clock::ManualClock;
    use pretty_assertions::assert_eq;

    struct Harness {
        api: MockApi,
        tokens: Arc<TokenService>,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    }

    fn harness(faults: Arc<dyn FaultPolicy>) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let tokens = Arc::new(TokenService::new(store.clone(), clock.clone()));
        let api = MockApi::new(
            SimulationSettings::instant(),
            tokens.clone(),
            Arc::new(ResponseBridge::new()),
            faults,
            None,
        );
        Harness {
            api,
            tokens,
            store,
            clock,
        }
    }

    fn login(harness: &Harness) -> Session {
        let session = Session {
            user_id: "user_001".to_string(),
            username: "john.doe".to_string(),
            full_name: "John Doe".to_string(),
            email: "john.doe@example.com".to_string(),
            role: Role::User,
            account_number: "1234567890".to_string(),
            login_time: Utc::now(),
        };
        set_json(harness.store.as_ref(), keys::SESSION, &session).expect("session");
        harness.tokens.issue(&session).expect("issue");
        session
    }

    #[tokio::test]
    async fn protected_endpoint_without_token_is_401() {
        let h = harness(Arc::new(NoFaults));
        let envelope = h
            .api
            .get(
                "/api/account/balance",
                || Ok(HandlerOutcome::ok(serde_json::json!({"balance": 1}))),
                RequestOptions::default(),
            )
            .await;

        assert!(!envelope.success);
        assert_eq!(envelope.status, 401);
        assert_eq!(envelope.error_code(), Some("UNAUTHORIZED"));
        assert!(envelope.meta.duration.is_none());
    }

    #[tokio::test]
    async fn public_endpoint_succeeds_without_token() {
        let h = harness(Arc::new(NoFaults));
        let envelope = h
            .api
            .post(
                "/api/auth/login",
                || Ok(HandlerOutcome::ok(serde_json::json!({"user": "john.doe"}))),
                RequestOptions::default(),
            )
            .await;

        assert!(envelope.success);
        assert_eq!(envelope.status, 201);
        assert_eq!(envelope.data, Some(serde_json::json!({"user": "john.doe"})));
    }

    #[tokio::test]
    async fn get_success_is_200_post_success_is_201() {
        let h = harness(Arc::new(NoFaults));
        login(&h);

        let get = h
            .api
            .get(
                "/api/account/balance",
                || Ok(HandlerOutcome::ok(serde_json::json!({"balance": 1}))),
                RequestOptions::default(),
            )
            .await;
        assert_eq!(get.status, 200);
        assert_eq!(get.meta.method.as_deref(), Some("GET"));
        assert_eq!(get.meta.endpoint.as_deref(), Some("/api/account/balance"));
        assert!(get.meta.duration.is_some());

        let post = h
            .api
            .post(
                "/api/transfers",
                || Ok(HandlerOutcome::ok(serde_json::json!({"ok": true}))),
                RequestOptions::default(),
            )
            .await;
        assert_eq!(post.status, 201);
    }

    #[tokio::test]
    async fn domain_failure_maps_to_400_with_default_code() {
        let h = harness(Arc::new(NoFaults));
        login(&h);

        let envelope = h
            .api
            .post(
                "/api/transfers",
                || Ok(HandlerOutcome::fail("Insufficient balance")),
                RequestOptions::default(),
            )
            .await;

        assert!(!envelope.success);
        assert_eq!(envelope.status, 400);
        assert_eq!(envelope.error_code(), Some("BAD_REQUEST"));
        assert_eq!(
            envelope.error.as_ref().map(|e| e.message.as_str()),
            Some("Insufficient balance")
        );
    }

    #[tokio::test]
    async fn handler_error_maps_to_500_with_message() {
        let h = harness(Arc::new(NoFaults));
        login(&h);

        let envelope = h
            .api
            .get(
                "/api/account/balance",
                || Err(AppError::internal("users collection unreadable")),
                RequestOptions::default(),
            )
            .await;

        assert!(!envelope.success);
        assert_eq!(envelope.status, 500);
        assert_eq!(envelope.error_code(), Some("SERVER_ERROR"));
        assert_eq!(
            envelope.error.as_ref().map(|e| e.message.as_str()),
            Some("users collection unreadable")
        );
    }

    #[tokio::test]
    async fn injected_fault_short_circuits_with_500() {
        let h = harness(Arc::new(AlwaysFail));
        login(&h);

        let handler_ran = std::cell::Cell::new(false);
        let envelope = h
            .api
            .get(
                "/api/account/balance",
                || {
                    handler_ran.set(true);
                    Ok(HandlerOutcome::ok(serde_json::json!({})))
                },
                RequestOptions::default(),
            )
            .await;

        assert_eq!(envelope.status, 500);
        assert_eq!(envelope.error_code(), Some("INTERNAL_SERVER_ERROR"));
        assert!(!handler_ran.get());
    }

    #[tokio::test]
    async fn expired_token_is_silently_refreshed_once() {
        let h = harness(Arc::new(NoFaults));
        login(&h);
        h.clock
            .advance(crate::services::token_service::ACCESS_TOKEN_TTL_MS + 1);

        let envelope = h
            .api
            .get(
                "/api/account/balance",
                || Ok(HandlerOutcome::ok(serde_json::json!({"balance": 1}))),
                RequestOptions::default(),
            )
            .await;

        assert!(envelope.success);
        // The refreshed token is valid again.
        assert!(h.tokens.verify_stored(TokenKind::Access).valid);
    }

    #[tokio::test]
    async fn expired_tokens_without_session_map_to_token_expired() {
        let h = harness(Arc::new(NoFaults));
        login(&h);
        // Session removed: refresh must fail and clear both tokens.
        h.store.remove(keys::SESSION);
        h.clock
            .advance(crate::services::token_service::ACCESS_TOKEN_TTL_MS + 1);

        let envelope = h
            .api
            .get(
                "/api/account/balance",
                || Ok(HandlerOutcome::ok(serde_json::json!({}))),
                RequestOptions::default(),
            )
            .await;

        assert_eq!(envelope.status, 401);
        assert_eq!(envelope.error_code(), Some("TOKEN_EXPIRED"));
        assert_eq!(h.tokens.access_token(), None);
    }

    #[tokio::test]
    async fn runtime_configuration_changes_apply() {
        let h = harness(Arc::new(NoFaults));
        h.api.configure(|s| s.logging = true).await;
        assert!(h.api.settings().await.logging);

        // Invalid mutations are rejected wholesale.
        h.api
            .configure(|s| {
                s.min_delay_ms = 500;
                s.max_delay_ms = 100;
            })
            .await;
        let settings = h.api.settings().await;
        assert_eq!(settings.min_delay_ms, 0);
        assert_eq!(settings.max_delay_ms, 0);
    }

    #[test]
    fn request_ids_are_unique_and_prefixed() {
        let a = generate_request_id();
        let b = generate_request_id();
        assert!(a.starts_with("req_"));
        assert_ne!(a, b);
    }
}
