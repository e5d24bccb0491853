//! The module contains the error the engine can throw.
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
///
/// Everything except [`Database`] is recoverable at the caller level; the
/// HTTP layer maps the variants to 4xx statuses.
///
/// [`Database`]: EngineError::Database
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid rule: {0}")]
    InvalidRule(String),
    #[error("Duplicate decision: {0}")]
    DuplicateDecision(String),
    #[error("Expense closed: {0}")]
    ExpenseClosed(String),
    #[error("Not an approver: {0}")]
    NotAnApprover(String),
    #[error("Manager cycle: {0}")]
    ManagerCycle(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(String),
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidRule(a), Self::InvalidRule(b)) => a == b,
            (Self::DuplicateDecision(a), Self::DuplicateDecision(b)) => a == b,
            (Self::ExpenseClosed(a), Self::ExpenseClosed(b)) => a == b,
            (Self::NotAnApprover(a), Self::NotAnApprover(b)) => a == b,
            (Self::ManagerCycle(a), Self::ManagerCycle(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::CurrencyMismatch(a), Self::CurrencyMismatch(b)) => a == b,
            (Self::ConcurrentModification(a), Self::ConcurrentModification(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
