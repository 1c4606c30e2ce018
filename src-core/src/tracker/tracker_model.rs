use serde::{Deserialize, Serialize};

use crate::expenses::{CategoryFilter, Expense};
use crate::insights::SpendingSummary;

/// Lifecycle of the live view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewState {
    Unauthenticated,
    Loading,
    Ready,
    Error,
}

/// Current search term and category selection for the list view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ExpenseFilter {
    pub search_term: String,
    pub category: CategoryFilter,
}

/// Everything the presentation layer needs for one render: the state, the
/// filtered list, and the aggregates over the full list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerView {
    pub state: ViewState,
    pub last_error: Option<String>,
    pub expenses: Vec<Expense>,
    pub summary: SpendingSummary,
    /// Remote documents skipped at the ingestion boundary in the latest
    /// snapshot.
    pub quarantined_documents: usize,
}
