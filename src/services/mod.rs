pub mod auth_service;
pub mod bank_service;
pub mod bridge;
pub mod fault;
pub mod mock_api;
pub mod sanitizer;
pub mod service_worker;
pub mod token_service;

use thiserror::Error;

use crate::error::AppError;

/// Failures a domain operation can report. These travel back to callers as
/// 400-class envelope errors; only the `Storage` variant escalates to the
/// orchestrator's 500 path.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Email already registered")]
    EmailTaken,
    #[error("User not found")]
    UserNotFound,
    #[error("Account not found")]
    AccountNotFound,
    #[error("Sender account not found")]
    SenderNotFound,
    #[error("Recipient account not found")]
    RecipientNotFound,
    #[error("Transfer amount must be greater than zero")]
    NonPositiveAmount,
    #[error("Insufficient balance")]
    InsufficientBalance,
    #[error("Cannot transfer to your own account")]
    SelfTransfer,
    #[error("Invalid profile update: {0}")]
    InvalidUpdate(String),
    #[error(transparent)]
    Storage(#[from] AppError),
}

pub type DomainResult<T> = Result<T, DomainError>;
