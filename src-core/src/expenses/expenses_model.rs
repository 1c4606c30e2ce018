use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;
use crate::expenses::expenses_errors::ExpenseError;

/// Closed set of expense categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Food,
    Transport,
    Entertainment,
    Shopping,
    Bills,
    Health,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Food,
        Category::Transport,
        Category::Entertainment,
        Category::Shopping,
        Category::Bills,
        Category::Health,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Transport => "Transport",
            Category::Entertainment => "Entertainment",
            Category::Shopping => "Shopping",
            Category::Bills => "Bills",
            Category::Health => "Health",
            Category::Other => "Other",
        }
    }

    /// Chart color assigned to this category.
    pub fn chart_color(&self) -> &'static str {
        match self {
            Category::Food => "#3B82F6",
            Category::Transport => "#8B5CF6",
            Category::Entertainment => "#EF4444",
            Category::Shopping => "#F59E0B",
            Category::Bills => "#10B981",
            Category::Health => "#F97316",
            Category::Other => "#6B7280",
        }
    }
}

impl Default for Category {
    /// Category preselected in a blank expense form.
    fn default() -> Self {
        Category::Food
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "food" => Ok(Category::Food),
            "transport" => Ok(Category::Transport),
            "entertainment" => Ok(Category::Entertainment),
            "shopping" => Ok(Category::Shopping),
            "bills" => Ok(Category::Bills),
            "health" => Ok(Category::Health),
            "other" => Ok(Category::Other),
            _ => Err(ValidationError::InvalidInput(format!(
                "unknown category '{}'",
                s
            ))),
        }
    }
}

/// Category selection for the list view: everything, or one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryFilter {
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(selected) => *selected == category,
        }
    }
}

impl Default for CategoryFilter {
    fn default() -> Self {
        CategoryFilter::All
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => write!(f, "all"),
            CategoryFilter::Only(category) => write!(f, "{}", category),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(CategoryFilter::All)
        } else {
            Ok(CategoryFilter::Only(s.parse()?))
        }
    }
}

/// Domain model representing one expense record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub title: String,
    pub amount: Decimal,
    pub category: Category,
    pub date: NaiveDate,
    pub owner_id: String,
    /// Server-assigned creation timestamp, used only for ordering.
    /// `None` while the server timestamp is still pending.
    pub created_at: Option<DateTime<Utc>>,
}

/// Untyped document as pushed by the remote store: an id plus whatever
/// JSON body the store currently holds for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseDocument {
    pub id: String,
    pub data: Value,
}

impl Expense {
    /// Validates and coerces a raw remote document into the typed model.
    /// Documents that fail here are quarantined by the caller instead of
    /// flowing into aggregates.
    pub fn from_document(document: &ExpenseDocument) -> std::result::Result<Self, ExpenseError> {
        let invalid =
            |reason: String| ExpenseError::InvalidDocument(format!("{}: {}", document.id, reason));

        let data = document
            .data
            .as_object()
            .ok_or_else(|| invalid("body is not an object".to_string()))?;

        let title = data
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .ok_or_else(|| invalid("missing or empty title".to_string()))?
            .to_string();

        let amount = match data.get("amount") {
            Some(Value::Number(number)) => Decimal::from_str(&number.to_string())
                .map_err(|e| invalid(format!("unreadable amount {}: {}", number, e)))?,
            Some(Value::String(text)) => Decimal::from_str(text.trim())
                .map_err(|e| invalid(format!("unreadable amount '{}': {}", text, e)))?,
            _ => return Err(invalid("missing amount".to_string())),
        };

        let category = data
            .get("category")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("missing category".to_string()))?
            .parse::<Category>()
            .map_err(|e| invalid(e.to_string()))?;

        let date = data
            .get("date")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("missing date".to_string()))
            .and_then(|text| {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map_err(|e| invalid(format!("unreadable date '{}': {}", text, e)))
            })?;

        let owner_id = data
            .get("ownerId")
            .and_then(Value::as_str)
            .filter(|owner| !owner.is_empty())
            .ok_or_else(|| invalid("missing ownerId".to_string()))?
            .to_string();

        // A pending server timestamp arrives as null; those records sort
        // after every timestamped one.
        let created_at = data
            .get("createdAt")
            .and_then(Value::as_str)
            .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
            .map(|timestamp| timestamp.with_timezone(&Utc));

        Ok(Expense {
            id: document.id.clone(),
            title,
            amount,
            category,
            date,
            owner_id,
            created_at,
        })
    }

    pub fn to_document(&self) -> ExpenseDocument {
        ExpenseDocument {
            id: self.id.clone(),
            data: json!({
                "title": self.title,
                "amount": self.amount,
                "category": self.category,
                "date": self.date,
                "ownerId": self.owner_id,
                "createdAt": self.created_at,
            }),
        }
    }
}

/// Input model for creating a new expense
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExpense {
    /// Provisional id; the repository assigns the durable one when absent.
    pub id: Option<String>,
    pub title: String,
    pub amount: Decimal,
    pub category: Category,
    /// Defaults to today when not supplied.
    pub date: Option<NaiveDate>,
}

impl NewExpense {
    /// Builds an input model from raw form fields. Parsing or validation
    /// failures surface here, before any write is attempted.
    pub fn from_form(
        title: &str,
        amount: &str,
        category: &str,
        date: Option<&str>,
    ) -> std::result::Result<Self, ValidationError> {
        let new_expense = NewExpense {
            id: None,
            title: title.trim().to_string(),
            amount: amount.trim().parse::<Decimal>()?,
            category: category.parse()?,
            date: date
                .map(|text| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
                .transpose()?,
        };
        new_expense.validate()?;
        Ok(new_expense)
    }

    /// Validates the new expense data
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title".to_string()));
        }
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidInput(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        Ok(())
    }

    pub fn effective_date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Utc::now().date_naive())
    }
}

/// Input model for editing an expense. The edit is a full-record
/// overwrite; there are no partial patch semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseUpdate {
    pub id: String,
    pub title: String,
    pub amount: Decimal,
    pub category: Category,
    pub date: NaiveDate,
}

impl ExpenseUpdate {
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title".to_string()));
        }
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidInput(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}
