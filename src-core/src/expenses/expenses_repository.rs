use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::debug;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::constants::SNAPSHOT_CHANNEL_CAPACITY;
use crate::errors::{Result, WriteError};
use crate::expenses::expenses_errors::ExpenseError;
use crate::expenses::expenses_model::{Expense, ExpenseDocument, ExpenseUpdate, NewExpense};
use crate::expenses::expenses_traits::{
    ExpenseRepositoryTrait, RepositoryPush, SnapshotSubscription,
};

/// In-process stand-in for the remote document store. Keeps raw documents
/// and fans every acknowledged write out to the owner's subscribers as a
/// whole-snapshot replacement, the way the managed backend does.
pub struct InMemoryExpenseRepository {
    documents: DashMap<String, ExpenseDocument>,
    channels: DashMap<String, broadcast::Sender<RepositoryPush>>,
}

impl InMemoryExpenseRepository {
    pub fn new() -> Self {
        InMemoryExpenseRepository {
            documents: DashMap::new(),
            channels: DashMap::new(),
        }
    }

    /// Stores a document exactly as a remote push would deliver it,
    /// bypassing write validation. Lets callers represent documents the
    /// remote store already holds, malformed ones included.
    pub fn insert_raw_document(&self, owner_id: &str, document: ExpenseDocument) {
        self.documents.insert(document.id.clone(), document);
        self.publish_snapshot(owner_id);
    }

    fn sender_for(&self, owner_id: &str) -> broadcast::Sender<RepositoryPush> {
        self.channels
            .entry(owner_id.to_string())
            .or_insert_with(|| broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY).0)
            .clone()
    }

    fn document_owner(document: &ExpenseDocument) -> Option<&str> {
        document.data.get("ownerId").and_then(Value::as_str)
    }

    fn snapshot_for(&self, owner_id: &str) -> Vec<ExpenseDocument> {
        self.documents
            .iter()
            .filter(|entry| Self::document_owner(entry.value()) == Some(owner_id))
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn publish_snapshot(&self, owner_id: &str) {
        if let Some(sender) = self.channels.get(owner_id) {
            // Nobody listening is fine; the next subscriber gets a fresh
            // snapshot anyway.
            let _ = sender.send(RepositoryPush::Snapshot(self.snapshot_for(owner_id)));
        }
    }

    fn owned_document(&self, owner_id: &str, expense_id: &str) -> Result<ExpenseDocument> {
        let entry = self
            .documents
            .get(expense_id)
            .ok_or_else(|| ExpenseError::NotFound(expense_id.to_string()))?;
        if Self::document_owner(entry.value()) != Some(owner_id) {
            return Err(ExpenseError::OwnerMismatch(expense_id.to_string()).into());
        }
        Ok(entry.value().clone())
    }
}

impl Default for InMemoryExpenseRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExpenseRepositoryTrait for InMemoryExpenseRepository {
    fn subscribe(&self, owner_id: &str) -> Result<SnapshotSubscription> {
        let sender = self.sender_for(owner_id);
        let receiver = sender.subscribe();
        // Initial snapshot so a new subscriber does not wait for the next
        // write. Other subscribers receive a redundant full replace.
        let _ = sender.send(RepositoryPush::Snapshot(self.snapshot_for(owner_id)));
        Ok(SnapshotSubscription { receiver })
    }

    async fn create(&self, owner_id: &str, new_expense: NewExpense) -> Result<Expense> {
        let expense = Expense {
            id: new_expense
                .id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: new_expense.title.trim().to_string(),
            amount: new_expense.amount,
            category: new_expense.category,
            date: new_expense.effective_date(),
            owner_id: owner_id.to_string(),
            created_at: Some(Utc::now()),
        };
        if self.documents.contains_key(&expense.id) {
            return Err(
                WriteError::CreateFailed(format!("duplicate expense id {}", expense.id)).into(),
            );
        }
        debug!("created expense {} for owner {}", expense.id, owner_id);
        self.documents
            .insert(expense.id.clone(), expense.to_document());
        self.publish_snapshot(owner_id);
        Ok(expense)
    }

    async fn update(&self, owner_id: &str, update: ExpenseUpdate) -> Result<Expense> {
        let existing = self.owned_document(owner_id, &update.id)?;
        // Full-record overwrite; only the server-assigned timestamp carries
        // over.
        let created_at = existing
            .data
            .get("createdAt")
            .and_then(Value::as_str)
            .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
            .map(|timestamp| timestamp.with_timezone(&Utc));
        let expense = Expense {
            id: update.id.clone(),
            title: update.title.trim().to_string(),
            amount: update.amount,
            category: update.category,
            date: update.date,
            owner_id: owner_id.to_string(),
            created_at,
        };
        debug!("updated expense {} for owner {}", expense.id, owner_id);
        self.documents
            .insert(expense.id.clone(), expense.to_document());
        self.publish_snapshot(owner_id);
        Ok(expense)
    }

    async fn delete(&self, owner_id: &str, expense_id: &str) -> Result<usize> {
        self.owned_document(owner_id, expense_id)?;
        self.documents.remove(expense_id);
        debug!("deleted expense {} for owner {}", expense_id, owner_id);
        self.publish_snapshot(owner_id);
        Ok(1)
    }
}
