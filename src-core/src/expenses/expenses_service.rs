use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

use crate::errors::Result;
use crate::expenses::expenses_model::{Expense, ExpenseUpdate, NewExpense};
use crate::expenses::expenses_traits::{ExpenseRepositoryTrait, ExpenseServiceTrait};

/// Write path for expenses. Validation happens here, before anything
/// reaches the repository; a rejected input never produces a write.
pub struct ExpenseService {
    expense_repository: Arc<dyn ExpenseRepositoryTrait>,
}

impl ExpenseService {
    pub fn new(expense_repository: Arc<dyn ExpenseRepositoryTrait>) -> Self {
        ExpenseService { expense_repository }
    }
}

#[async_trait]
impl ExpenseServiceTrait for ExpenseService {
    async fn add_expense(&self, owner_id: &str, new_expense: NewExpense) -> Result<Expense> {
        new_expense.validate()?;
        debug!("adding expense '{}' for owner {}", new_expense.title, owner_id);
        self.expense_repository.create(owner_id, new_expense).await
    }

    async fn update_expense(&self, owner_id: &str, update: ExpenseUpdate) -> Result<Expense> {
        update.validate()?;
        debug!("updating expense {} for owner {}", update.id, owner_id);
        self.expense_repository.update(owner_id, update).await
    }

    async fn delete_expense(&self, owner_id: &str, expense_id: &str) -> Result<usize> {
        debug!("deleting expense {} for owner {}", expense_id, owner_id);
        self.expense_repository.delete(owner_id, expense_id).await
    }
}
