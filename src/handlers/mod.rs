//! Typed API surface over the mock request orchestrator: one function per
//! endpoint, each wiring a request body and a domain closure into
//! `MockApi::request`. This is the layer application code talks to.

mod auth;
mod bank;

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SimulationSettings;
use crate::error::AppResult;
use crate::services::DomainError;
use crate::services::auth_service::AuthService;
use crate::services::bank_service::BankService;
use crate::services::bridge::{DEFAULT_CONSUMER_TIMEOUT, ResponseBridge};
use crate::services::fault::{FaultPolicy, RandomFaults};
use crate::services::mock_api::{HandlerOutcome, MockApi, spawn_page_listener};
use crate::services::service_worker::{DEFAULT_RESOLVE_TIMEOUT, NetworkLog, WorkerHandle};
use crate::services::token_service::TokenService;
use crate::storage::KeyValueStore;
use crate::utils::clock::{Clock, SystemClock};

/// The assembled client: orchestrator plus the domain services its handlers
/// close over. One instance corresponds to one browser profile.
pub struct BankClient {
    pub api: MockApi,
    pub auth: AuthService,
    pub bank: BankService,
    pub tokens: Arc<TokenService>,
}

impl BankClient {
    /// Client without network visibility, with production clock and fault
    /// policy.
    pub fn new(store: Arc<dyn KeyValueStore>, settings: SimulationSettings) -> Self {
        BankClientBuilder::new(store).settings(settings).build()
    }

    /// Client with the worker context attached: requests show up in the
    /// network log.
    pub async fn with_network(store: Arc<dyn KeyValueStore>, settings: SimulationSettings) -> Self {
        BankClientBuilder::new(store)
            .settings(settings)
            .network_visibility(true)
            .build_async()
            .await
    }

    pub fn builder(store: Arc<dyn KeyValueStore>) -> BankClientBuilder {
        BankClientBuilder::new(store)
    }

    /// The worker's transcript, when network visibility is on.
    pub fn network_log(&self) -> Option<NetworkLog> {
        self.api.worker().map(|worker| worker.network_log())
    }
}

pub struct BankClientBuilder {
    store: Arc<dyn KeyValueStore>,
    settings: SimulationSettings,
    clock: Arc<dyn Clock>,
    faults: Arc<dyn FaultPolicy>,
    network_visibility: bool,
    consumer_timeout: Duration,
    resolve_timeout: Duration,
}

impl BankClientBuilder {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            settings: SimulationSettings::default(),
            clock: Arc::new(SystemClock),
            faults: Arc::new(RandomFaults),
            network_visibility: false,
            consumer_timeout: DEFAULT_CONSUMER_TIMEOUT,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    pub fn settings(mut self, settings: SimulationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn fault_policy(mut self, faults: Arc<dyn FaultPolicy>) -> Self {
        self.faults = faults;
        self
    }

    pub fn network_visibility(mut self, enabled: bool) -> Self {
        self.network_visibility = enabled;
        self
    }

    /// Shrink both rendezvous timeouts, mainly for tests.
    pub fn timeouts(mut self, consumer: Duration, resolve: Duration) -> Self {
        self.consumer_timeout = consumer;
        self.resolve_timeout = resolve;
        self
    }

    /// Build without the worker context. Panics if network visibility was
    /// requested; use `build_async` for that.
    pub fn build(self) -> BankClient {
        assert!(
            !self.network_visibility,
            "network visibility requires build_async()"
        );
        let bridge = Arc::new(ResponseBridge::with_timeout(self.consumer_timeout));
        self.assemble(bridge, None)
    }

    /// Build, spawning and registering the worker when network visibility
    /// is on.
    pub async fn build_async(self) -> BankClient {
        let bridge = Arc::new(ResponseBridge::with_timeout(self.consumer_timeout));
        let worker = if self.network_visibility {
            let page = spawn_page_listener(bridge.clone());
            Some(WorkerHandle::register(self.resolve_timeout, page).await)
        } else {
            None
        };
        self.assemble(bridge, worker)
    }

    fn assemble(
        self,
        bridge: Arc<ResponseBridge>,
        worker: Option<WorkerHandle>,
    ) -> BankClient {
        let tokens = Arc::new(TokenService::new(self.store.clone(), self.clock.clone()));
        let api = MockApi::new(
            self.settings.clone(),
            tokens.clone(),
            bridge,
            self.faults.clone(),
            worker,
        );
        BankClient {
            api,
            auth: AuthService::new(self.store.clone()),
            bank: BankService::new(self.store.clone()),
            tokens,
        }
    }
}

/// Adapt a domain result into a handler outcome: domain failures become
/// 400-class envelope errors under the given code, storage failures escalate
/// to the orchestrator's 500 path.
fn outcome<T: Serialize>(result: Result<T, DomainError>, code: &str) -> AppResult<HandlerOutcome> {
    match result {
        Ok(value) => Ok(HandlerOutcome::ok(serde_json::to_value(value)?)),
        Err(DomainError::Storage(error)) => Err(error),
        Err(domain) => Ok(HandlerOutcome::fail_with_code(code, domain.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn outcome_maps_domain_failure_to_coded_handler_failure() {
        let result: Result<(), DomainError> = Err(DomainError::InsufficientBalance);
        let handler_outcome = outcome(result, "TRANSFER_FAILED").expect("not a 500");
        assert!(!handler_outcome.success);
        assert_eq!(handler_outcome.error_code.as_deref(), Some("TRANSFER_FAILED"));
        assert_eq!(handler_outcome.error.as_deref(), Some("Insufficient balance"));
    }

    #[test]
    fn outcome_escalates_storage_failures() {
        let result: Result<(), DomainError> = Err(DomainError::Storage(
            crate::error::AppError::internal("disk on fire"),
        ));
        assert!(outcome(result, "TRANSFER_FAILED").is_err());
    }

    #[test]
    fn builder_defaults_build_without_worker() {
        let client = BankClient::new(
            Arc::new(MemoryStore::new()),
            SimulationSettings::instant(),
        );
        assert!(client.api.worker().is_none());
        assert!(client.network_log().is_none());
    }
}
