pub mod insights_model;
pub mod insights_service;

pub use insights_model::{MonthlyTotal, SpendingSummary};
