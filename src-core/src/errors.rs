use thiserror::Error;

use crate::expenses::expenses_errors::ExpenseError;

// Create a type alias for Result using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the expense tracker
#[derive(Error, Debug)]
pub enum Error {
    #[error("Subscription failed: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("Write operation failed: {0}")]
    Write(#[from] WriteError),

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Expense error: {0}")]
    Expense(#[from] ExpenseError),

    #[error("No authenticated session")]
    Unauthenticated,
}

/// Failures of the snapshot stream from the remote store. Surfaced to the
/// user transiently; cached data is retained.
#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("Failed to open snapshot stream: {0}")]
    OpenFailed(String),

    #[error("Snapshot stream interrupted: {0}")]
    Interrupted(String),
}

/// Per-operation write failures. Never retried automatically; the caller
/// keeps the in-progress input so the user can retry.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Failed to create expense: {0}")]
    CreateFailed(String),

    #[error("Failed to update expense: {0}")]
    UpdateFailed(String),

    #[error("Failed to delete expense: {0}")]
    DeleteFailed(String),
}

/// Input-boundary failures, raised before any write is attempted.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to parse decimal number: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Failed to parse date: {0}")]
    DateParse(#[from] chrono::ParseError),
}
