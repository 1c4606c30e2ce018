pub mod expenses_errors;
pub mod expenses_model;
pub mod expenses_repository;
pub mod expenses_service;
pub mod expenses_traits;

pub use expenses_errors::ExpenseError;
pub use expenses_model::{
    Category, CategoryFilter, Expense, ExpenseDocument, ExpenseUpdate, NewExpense,
};
pub use expenses_repository::InMemoryExpenseRepository;
pub use expenses_service::ExpenseService;
pub use expenses_traits::{
    ExpenseRepositoryTrait, ExpenseServiceTrait, RepositoryPush, SnapshotSubscription,
};
