//! Simulated banking backend.
//!
//! Everything here runs in-process: domain operations execute synchronously
//! against an injected key-value store, and the mock API layer wraps them in
//! REST-like response envelopes with simulated latency, token authentication,
//! fault injection, and a service-worker-style network visibility layer that
//! records sanitized traffic in an inspectable log.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::SimulationSettings;
pub use error::{AppError, AppResult};
pub use handlers::BankClient;
pub use models::envelope::{Method, ResponseEnvelope};
pub use services::mock_api::MockApi;
