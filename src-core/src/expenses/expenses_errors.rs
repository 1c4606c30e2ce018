use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExpenseError {
    #[error("Expense not found: {0}")]
    NotFound(String),

    #[error("Expense {0} does not belong to the acting session")]
    OwnerMismatch(String),

    #[error("Invalid expense document {0}")]
    InvalidDocument(String),
}

pub type Result<T> = std::result::Result<T, ExpenseError>;
