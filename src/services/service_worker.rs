//! The worker context: a second, independent cooperative execution context
//! that intercepts tagged fetches and answers them with envelopes computed
//! by the page. The two contexts share no state; everything crosses over
//! explicit message channels, one private reply port per request.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::models::envelope::Method;

/// Only paths under this prefix are candidates for interception.
pub const API_PREFIX: &str = "/api/";
/// Tags a request as belonging to a simulated call; untagged requests pass
/// through untouched.
pub const CORRELATION_HEADER: &str = "X-Mock-Request-Id";
/// Fabricated responses echo the correlation id under this header.
pub const RESPONSE_ID_HEADER: &str = "X-Request-Id";

pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(30);

const LIFECYCLE_CHANNEL_CAPACITY: usize = 8;
const FETCH_CHANNEL_CAPACITY: usize = 64;

/// Address of the page's resolve listener.
pub type PageHandle = mpsc::Sender<ResolveMessage>;

/// Worker→page: "send me the envelope for this request id", together with
/// the private port the page answers on.
#[derive(Debug)]
pub struct ResolveMessage {
    pub request_id: String,
    pub reply: oneshot::Sender<PortMessage>,
}

/// Page→worker answer over the reply port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortMessage {
    pub body: Value,
    pub status: u16,
}

/// An outgoing request as the network layer sees it: sanitized body, masked
/// authorization, correlation header.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl FetchRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// An HTTP-shaped response fabricated by the worker.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn json(status: u16, body: &Value, request_id: Option<&str>) -> Self {
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
        ];
        if let Some(id) = request_id {
            headers.push((RESPONSE_ID_HEADER.to_string(), id.to_string()));
        }
        Self {
            status,
            headers,
            body: body.to_string(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// What the worker did with an intercepted request.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Not ours: wrong path, missing tag, or the worker is not active yet.
    Passthrough,
    Response(HttpResponse),
}

#[derive(Debug)]
enum LifecycleEvent {
    Install,
    Activate,
    /// The page wired up its resolve listener.
    Connect(PageHandle),
}

struct FetchEvent {
    request: FetchRequest,
    respond_to: oneshot::Sender<FetchOutcome>,
}

/// One completed, network-visible exchange. This is what an inspector would
/// show: the sanitized request next to the fabricated response.
#[derive(Debug, Clone)]
pub struct NetworkExchange {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub request_headers: Vec<(String, String)>,
    pub request_body: Option<Value>,
    pub status: u16,
    pub response_body: String,
}

/// Shared transcript of everything the worker answered.
#[derive(Debug, Clone, Default)]
pub struct NetworkLog {
    entries: Arc<Mutex<Vec<NetworkExchange>>>,
}

impl NetworkLog {
    fn record(&self, exchange: NetworkExchange) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(exchange);
        }
    }

    pub fn entries(&self) -> Vec<NetworkExchange> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct ServiceWorker {
    lifecycle_rx: mpsc::Receiver<LifecycleEvent>,
    fetch_rx: mpsc::Receiver<FetchEvent>,
    page: Option<PageHandle>,
    installed: bool,
    activated: bool,
    resolve_timeout: Duration,
    log: NetworkLog,
}

enum WorkerEvent {
    Lifecycle(LifecycleEvent),
    Fetch(FetchEvent),
}

impl ServiceWorker {
    async fn run(mut self) {
        loop {
            let event = tokio::select! {
                // Lifecycle first so an activate queued before a fetch wins.
                biased;
                event = self.lifecycle_rx.recv() => match event {
                    Some(event) => WorkerEvent::Lifecycle(event),
                    None => break,
                },
                event = self.fetch_rx.recv() => match event {
                    Some(event) => WorkerEvent::Fetch(event),
                    None => break,
                },
            };
            match event {
                WorkerEvent::Lifecycle(event) => self.handle_lifecycle(event),
                WorkerEvent::Fetch(event) => self.handle_fetch(event),
            }
        }
        debug!("service_worker_stopped");
    }

    fn handle_lifecycle(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Install => {
                // Skip waiting: installation activates eligibility right away.
                self.installed = true;
                debug!("service_worker_installed");
            }
            LifecycleEvent::Activate => {
                if self.installed {
                    self.activated = true;
                    info!("service_worker_activated");
                } else {
                    warn!("activate_before_install_ignored");
                }
            }
            LifecycleEvent::Connect(page) => {
                self.page = Some(page);
                debug!("service_worker_page_connected");
            }
        }
    }

    fn handle_fetch(&self, event: FetchEvent) {
        let FetchEvent {
            request,
            respond_to,
        } = event;

        if !self.activated
            || !request.path.starts_with(API_PREFIX)
            || request.header(CORRELATION_HEADER).is_none()
        {
            let _ = respond_to.send(FetchOutcome::Passthrough);
            return;
        }

        // Header presence checked just above.
        let request_id = match request.header(CORRELATION_HEADER) {
            Some(id) => id.to_string(),
            None => return,
        };

        let Some(page) = self.page.clone() else {
            warn!(request_id = %request_id, "fetch_without_page_context");
            let response = HttpResponse::json(
                502,
                &serde_json::json!({"success": false, "error": "No client context"}),
                None,
            );
            self.log.record(exchange_for(&request, &request_id, &response));
            let _ = respond_to.send(FetchOutcome::Response(response));
            return;
        };

        // Resolve each request on its own task so a slow page never blocks
        // the worker's event loop.
        let resolve_timeout = self.resolve_timeout;
        let log = self.log.clone();
        tokio::spawn(async move {
            let response = resolve_via_page(&page, &request_id, resolve_timeout).await;
            log.record(exchange_for(&request, &request_id, &response));
            let _ = respond_to.send(FetchOutcome::Response(response));
        });
    }
}

async fn resolve_via_page(
    page: &PageHandle,
    request_id: &str,
    resolve_timeout: Duration,
) -> HttpResponse {
    let (reply_tx, reply_rx) = oneshot::channel();
    let message = ResolveMessage {
        request_id: request_id.to_string(),
        reply: reply_tx,
    };

    if page.send(message).await.is_err() {
        warn!(request_id, "page_listener_gone");
        return HttpResponse::json(
            502,
            &serde_json::json!({"success": false, "error": "No client context"}),
            None,
        );
    }

    match timeout(resolve_timeout, reply_rx).await {
        Ok(Ok(PortMessage { body, status })) => {
            debug!(request_id, status, "fetch_resolved_by_page");
            HttpResponse::json(status, &body, Some(request_id))
        }
        _ => {
            warn!(request_id, "page_did_not_resolve_in_time");
            HttpResponse::json(
                504,
                &serde_json::json!({
                    "success": false,
                    "error": {
                        "code": "GATEWAY_TIMEOUT",
                        "message": "Mock handler did not respond in time"
                    }
                }),
                Some(request_id),
            )
        }
    }
}

fn exchange_for(request: &FetchRequest, request_id: &str, response: &HttpResponse) -> NetworkExchange {
    NetworkExchange {
        request_id: request_id.to_string(),
        method: request.method.as_str().to_string(),
        path: request.path.clone(),
        request_headers: request.headers.clone(),
        request_body: request.body.clone(),
        status: response.status,
        response_body: response.body.clone(),
    }
}

/// Page-side client for the worker, in the role of the service-worker
/// registration: drives lifecycle events and submits fetches.
#[derive(Clone)]
pub struct WorkerHandle {
    lifecycle_tx: mpsc::Sender<LifecycleEvent>,
    fetch_tx: mpsc::Sender<FetchEvent>,
    log: NetworkLog,
}

impl WorkerHandle {
    /// Spawn the worker task. It is not intercepting anything until
    /// installed and activated.
    pub fn spawn(resolve_timeout: Duration) -> Self {
        let (lifecycle_tx, lifecycle_rx) = mpsc::channel(LIFECYCLE_CHANNEL_CAPACITY);
        let (fetch_tx, fetch_rx) = mpsc::channel(FETCH_CHANNEL_CAPACITY);
        let log = NetworkLog::default();

        let worker = ServiceWorker {
            lifecycle_rx,
            fetch_rx,
            page: None,
            installed: false,
            activated: false,
            resolve_timeout,
            log: log.clone(),
        };
        tokio::spawn(worker.run());

        Self {
            lifecycle_tx,
            fetch_tx,
            log,
        }
    }

    /// Spawn, install, activate, and connect the page listener in one go.
    pub async fn register(resolve_timeout: Duration, page: PageHandle) -> Self {
        let handle = Self::spawn(resolve_timeout);
        handle.install().await;
        handle.activate().await;
        handle.connect(page).await;
        handle
    }

    pub async fn install(&self) {
        let _ = self.lifecycle_tx.send(LifecycleEvent::Install).await;
    }

    pub async fn activate(&self) {
        let _ = self.lifecycle_tx.send(LifecycleEvent::Activate).await;
    }

    pub async fn connect(&self, page: PageHandle) {
        let _ = self.lifecycle_tx.send(LifecycleEvent::Connect(page)).await;
    }

    /// Submit a request to the worker and wait for its verdict. A dead
    /// worker degrades to pass-through so the caller is never stuck.
    pub async fn fetch(&self, request: FetchRequest) -> FetchOutcome {
        let (respond_tx, respond_rx) = oneshot::channel();
        let event = FetchEvent {
            request,
            respond_to: respond_tx,
        };
        if self.fetch_tx.send(event).await.is_err() {
            warn!("service_worker_unavailable");
            return FetchOutcome::Passthrough;
        }
        respond_rx.await.unwrap_or_else(|_| {
            warn!("service_worker_dropped_fetch");
            FetchOutcome::Passthrough
        })
    }

    pub fn network_log(&self) -> NetworkLog {
        self.log.clone()
    }
}
