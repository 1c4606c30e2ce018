use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::errors::Result;
use crate::expenses::expenses_model::{Expense, ExpenseDocument, ExpenseUpdate, NewExpense};

/// One push from the remote store: either the full current record set for
/// the subscribed owner, or a stream failure.
#[derive(Debug, Clone)]
pub enum RepositoryPush {
    Snapshot(Vec<ExpenseDocument>),
    Error(String),
}

/// Handle for an open snapshot stream. Dropping it is the unsubscribe.
pub struct SnapshotSubscription {
    pub receiver: broadcast::Receiver<RepositoryPush>,
}

/// Narrow interface to the remote document store holding expenses. The
/// store owns durable state; everything behind this trait is a black box.
#[async_trait]
pub trait ExpenseRepositoryTrait: Send + Sync {
    /// Opens a snapshot stream scoped to one owner. The ownerId equality
    /// filter lives at this query boundary, not in application logic.
    /// An initial snapshot is delivered shortly after subscribing.
    fn subscribe(&self, owner_id: &str) -> Result<SnapshotSubscription>;

    /// Creates an expense, assigning the durable id and `created_at`.
    async fn create(&self, owner_id: &str, new_expense: NewExpense) -> Result<Expense>;

    /// Overwrites an expense in full. Fails on unknown id or owner
    /// mismatch.
    async fn update(&self, owner_id: &str, update: ExpenseUpdate) -> Result<Expense>;

    /// Deletes an expense, returning the number of records removed.
    async fn delete(&self, owner_id: &str, expense_id: &str) -> Result<usize>;
}

/// Trait for expense write operations, validated at the input boundary.
#[async_trait]
pub trait ExpenseServiceTrait: Send + Sync {
    async fn add_expense(&self, owner_id: &str, new_expense: NewExpense) -> Result<Expense>;
    async fn update_expense(&self, owner_id: &str, update: ExpenseUpdate) -> Result<Expense>;
    async fn delete_expense(&self, owner_id: &str, expense_id: &str) -> Result<usize>;
}
