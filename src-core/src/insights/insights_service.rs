//! Pure aggregation over the in-memory expense list. No I/O, no mutation
//! of inputs; every function is deterministic for identical input.

use chrono::NaiveDate;
use num_traits::Zero;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::constants::{DISPLAY_DECIMAL_PRECISION, MONTH_LABEL_FORMAT};
use crate::expenses::{Category, CategoryFilter, Expense};
use crate::insights::insights_model::{MonthlyTotal, SpendingSummary};

/// Sum of all amounts; zero for an empty list.
pub fn total(expenses: &[Expense]) -> Decimal {
    expenses
        .iter()
        .fold(Decimal::zero(), |sum, expense| sum + expense.amount)
}

/// Per-category sums. Categories absent from the input are absent from
/// the result, not zero-filled.
pub fn totals_by_category(expenses: &[Expense]) -> HashMap<Category, Decimal> {
    let mut totals: HashMap<Category, Decimal> = HashMap::new();
    for expense in expenses {
        *totals.entry(expense.category).or_insert_with(Decimal::zero) += expense.amount;
    }
    totals
}

pub fn month_label(date: NaiveDate) -> String {
    date.format(MONTH_LABEL_FORMAT).to_string()
}

/// Per-month sums in first-encounter order of each label.
pub fn totals_by_month(expenses: &[Expense]) -> Vec<MonthlyTotal> {
    let mut buckets: Vec<MonthlyTotal> = Vec::new();
    for expense in expenses {
        let label = month_label(expense.date);
        match buckets.iter_mut().find(|bucket| bucket.month == label) {
            Some(bucket) => bucket.amount += expense.amount,
            None => buckets.push(MonthlyTotal {
                month: label,
                amount: expense.amount,
            }),
        }
    }
    buckets
}

/// Spending in the month containing `today`; zero when that bucket is
/// absent.
pub fn current_month_total(expenses: &[Expense], today: NaiveDate) -> Decimal {
    let label = month_label(today);
    totals_by_month(expenses)
        .into_iter()
        .find(|bucket| bucket.month == label)
        .map(|bucket| bucket.amount)
        .unwrap_or_else(Decimal::zero)
}

pub fn distinct_category_count(expenses: &[Expense]) -> usize {
    expenses
        .iter()
        .map(|expense| expense.category)
        .collect::<HashSet<_>>()
        .len()
}

/// Case-insensitive substring match of the verbatim search term against
/// the title (an empty term matches everything) AND category equality
/// unless the filter is `All`. Order-preserving and idempotent.
pub fn filter_expenses(
    expenses: &[Expense],
    search_term: &str,
    category_filter: CategoryFilter,
) -> Vec<Expense> {
    let needle = search_term.to_lowercase();
    expenses
        .iter()
        .filter(|expense| {
            expense.title.to_lowercase().contains(&needle)
                && category_filter.matches(expense.category)
        })
        .cloned()
        .collect()
}

/// Primary list order: newest `created_at` first. Records still waiting
/// for their server timestamp sort after every timestamped one.
pub fn sort_by_created_desc(expenses: &mut [Expense]) {
    expenses.sort_by(|a, b| match (&a.created_at, &b.created_at) {
        (Some(a_ts), Some(b_ts)) => b_ts.cmp(a_ts),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Composes the aggregates for the dashboard and rounds the displayed
/// values.
pub fn summarize(expenses: &[Expense], today: NaiveDate) -> SpendingSummary {
    let mut by_category = totals_by_category(expenses);
    let mut by_month = totals_by_month(expenses);
    let category_count = by_category.len();

    for amount in by_category.values_mut() {
        *amount = amount.round_dp(DISPLAY_DECIMAL_PRECISION);
    }
    for bucket in by_month.iter_mut() {
        bucket.amount = bucket.amount.round_dp(DISPLAY_DECIMAL_PRECISION);
    }

    SpendingSummary {
        total_spending: total(expenses).round_dp(DISPLAY_DECIMAL_PRECISION),
        current_month_total: current_month_total(expenses, today)
            .round_dp(DISPLAY_DECIMAL_PRECISION),
        by_category,
        by_month,
        transaction_count: expenses.len(),
        category_count,
    }
}
