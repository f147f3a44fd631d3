//! Ledger rows: transactions and expenses.

use super::booking::InvoiceAmount;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Money direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    In,
    Out,
}

impl TransactionKind {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            _ => Err(format!("Invalid transaction kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Invalid transaction type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Void,
}

impl TransactionStatus {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Void => "void",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "void" => Ok(Self::Void),
            _ => Err(format!("Invalid transaction status: {}", s)),
        }
    }
}

/// Expense category inferred from the booking section an attachment was uploaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    Hotel,
    Transport,
    Guide,
    Meals,
    Activities,
    Other,
}

impl ExpenseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hotel => "hotel",
            Self::Transport => "transport",
            Self::Guide => "guide",
            Self::Meals => "meals",
            Self::Activities => "activities",
            Self::Other => "other",
        }
    }

    /// Infer the category from an upload context label. Unknown or missing
    /// labels fall back to `Other`.
    pub fn infer(context: Option<&str>) -> Self {
        let Some(context) = context else {
            return Self::Other;
        };
        match context.trim().to_ascii_lowercase().as_str() {
            "hotel" | "hotels" | "accommodation" => Self::Hotel,
            "transport" | "transfer" | "transfers" | "driver" | "vehicle" => Self::Transport,
            "guide" | "guides" => Self::Guide,
            "meals" | "meal" | "restaurant" | "food" => Self::Meals,
            "activities" | "activity" | "excursion" | "tour" => Self::Activities,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Financial movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub booking_id: Option<Uuid>,
    pub attachment_id: Option<Uuid>,
    /// Salary profile the row was generated for.
    pub owner_id: Option<Uuid>,
    pub kind: TransactionKind,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub category: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub date: NaiveDate,
    pub status: TransactionStatus,
    pub is_paid: bool,
    pub is_auto_generated: bool,
    pub notes: Option<String>,
    pub period_key: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Transaction {
    pub fn is_confirmed(&self) -> bool {
        self.status == TransactionStatus::Confirmed
    }
}

/// Input for inserting a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub booking_id: Option<Uuid>,
    pub attachment_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub kind: TransactionKind,
    pub tx_type: TransactionType,
    pub category: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub date: NaiveDate,
    pub status: TransactionStatus,
    pub is_paid: bool,
    pub is_auto_generated: bool,
    pub notes: Option<String>,
    pub period_key: Option<String>,
}

/// Fields the schedule reconciler is allowed to rewrite on an existing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    pub amount: Decimal,
    pub currency: String,
    pub date: NaiveDate,
    pub description: String,
    pub notes: String,
}

/// Filter for transaction queries. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub category: Option<String>,
    pub kind: Option<TransactionKind>,
    pub exclude_status: Option<TransactionStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub owner_ids: Option<Vec<Uuid>>,
    pub booking_id: Option<Uuid>,
    pub period_key: Option<String>,
}

impl TransactionFilter {
    /// Whether a row satisfies this filter.
    pub fn matches(&self, tx: &Transaction) -> bool {
        self.category.as_ref().map_or(true, |c| &tx.category == c)
            && self.kind.map_or(true, |k| tx.kind == k)
            && self.exclude_status.map_or(true, |s| tx.status != s)
            && self.date_from.map_or(true, |d| tx.date >= d)
            && self.date_to.map_or(true, |d| tx.date <= d)
            && self.booking_id.map_or(true, |b| tx.booking_id == Some(b))
            && self
                .period_key
                .as_ref()
                .map_or(true, |k| tx.period_key.as_ref() == Some(k))
            && self
                .owner_ids
                .as_ref()
                .map_or(true, |ids| tx.owner_id.is_some_and(|o| ids.contains(&o)))
    }
}

/// Transactions bound to an attachment.
///
/// Rows carrying `attachment_id` match by key. Rows written before the key
/// was populated match when their description is one of
/// `legacy_descriptions`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionMatch {
    pub attachment_id: Uuid,
    pub legacy_descriptions: Vec<String>,
}

impl TransactionMatch {
    pub fn matches(&self, tx: &Transaction) -> bool {
        match tx.attachment_id {
            Some(id) => id == self.attachment_id,
            None => tx
                .description
                .as_ref()
                .is_some_and(|d| self.legacy_descriptions.contains(d)),
        }
    }
}

/// Expense row created alongside an attachment upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub attachment_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub expense_type: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub expense_date: NaiveDate,
    pub created_by: String,
    pub created_utc: DateTime<Utc>,
}

/// Input for inserting an expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    pub attachment_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub expense_type: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub expense_date: NaiveDate,
    pub created_by: String,
}

/// Everything written for an attachment that carries an amount. Stores
/// apply it as one unit: either all parts are persisted or none.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerBinding {
    pub booking_id: Uuid,
    pub attachment_id: Uuid,
    pub expense: NewExpense,
    pub transaction: NewTransaction,
    /// Present for invoice attachments only.
    pub invoice_amount: Option<InvoiceAmount>,
}
