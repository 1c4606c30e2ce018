use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::expenses::Category;

/// One calendar-month spending bucket. `month` is the year-aware label
/// ("Jan 2024"); bucket order follows first encounter in the input list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTotal {
    pub month: String,
    pub amount: Decimal,
}

/// Derived summary of the live expense list, feeding the dashboard cards
/// and charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingSummary {
    pub total_spending: Decimal,
    pub current_month_total: Decimal,
    pub by_category: HashMap<Category, Decimal>,
    pub by_month: Vec<MonthlyTotal>,
    pub transaction_count: usize,
    pub category_count: usize,
}

impl Default for SpendingSummary {
    fn default() -> Self {
        SpendingSummary {
            total_spending: Decimal::ZERO,
            current_month_total: Decimal::ZERO,
            by_category: HashMap::new(),
            by_month: Vec::new(),
            transaction_count: 0,
            category_count: 0,
        }
    }
}
