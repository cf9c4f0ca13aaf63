use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{LedgerError, Result};

// ---------------------------------------------------------------------------
// Enumerations stored as text or small integers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            _ => Err(LedgerError::InvalidValue { field: "kind", value: s.to_string() }),
        }
    }
}

/// Ledger status. Stored as 1/2/3 so existing databases keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LedgerStatus {
    Forecast,
    Processing,
    Complete,
}

impl LedgerStatus {
    pub fn code(&self) -> i64 {
        match self {
            Self::Forecast => 1,
            Self::Processing => 2,
            Self::Complete => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Forecast),
            2 => Some(Self::Processing),
            3 => Some(Self::Complete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forecast => "forecast",
            Self::Processing => "processing",
            Self::Complete => "complete",
        }
    }
}

impl FromStr for LedgerStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "forecast" | "1" => Ok(Self::Forecast),
            "processing" | "2" => Ok(Self::Processing),
            "complete" | "3" => Ok(Self::Complete),
            _ => Err(LedgerError::InvalidValue { field: "status", value: s.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    Booked,
    Pending,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Booked => "booked",
            Self::Pending => "pending",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "booked" => Ok(Self::Booked),
            "pending" => Ok(Self::Pending),
            _ => Err(LedgerError::InvalidValue { field: "booking_status", value: s.to_string() }),
        }
    }
}

/// What happened to a staged feed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Pending,
    Created,
    Updated,
    Duplicate,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Duplicate => "duplicate",
        }
    }
}

impl FromStr for Disposition {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "duplicate" => Ok(Self::Duplicate),
            _ => Err(LedgerError::InvalidValue { field: "disposition", value: s.to_string() }),
        }
    }
}

macro_rules! text_column {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: LedgerError| FromSqlError::Other(Box::new(e)))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_column!(TransactionKind);
text_column!(BookingStatus);
text_column!(Disposition);

impl ToSql for LedgerStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for LedgerStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_i64()?;
        Self::from_code(code).ok_or(FromSqlError::OutOfRange(code))
    }
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Money at the store boundary
// ---------------------------------------------------------------------------

/// Convert an amount to integer cents, rounding half away from zero.
pub fn to_cents(amount: Decimal) -> Result<i64> {
    (amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero) * Decimal::ONE_HUNDRED)
        .to_i64()
        .ok_or_else(|| LedgerError::InvalidAmount(amount.to_string()))
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Category/subcategory pair. 99/0 marks a record nobody has classified yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category_id: i64,
    pub subcategory_id: i64,
}

impl Classification {
    pub const UNCATEGORIZED: Classification = Classification {
        category_id: 99,
        subcategory_id: 0,
    };
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub account_type: String,
    pub institution: Option<String>,
    pub bank_account_id: Option<String>,
}

/// One feed transaction after normalization, before anything is written.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTransaction {
    pub external_id: String,
    pub bank_transaction_id: Option<String>,
    pub booking_status: BookingStatus,
    /// Signed, as the aggregator reports it: negative is money leaving the account.
    pub amount: Decimal,
    pub currency: String,
    pub date: NaiveDate,
    pub description: String,
    pub linked_account_id: i64,
}

/// A row in `raw_imports` together with the ledger-facing fields derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct StagingRecord {
    pub id: i64,
    pub external_id: String,
    pub linked_account_id: i64,
    pub booking_status: BookingStatus,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub kind: TransactionKind,
    pub status: LedgerStatus,
    pub acc_from: Option<i64>,
    pub acc_to: Option<i64>,
    pub disposition: Disposition,
    pub ledger_ref: Option<i64>,
}

impl StagingRecord {
    pub fn magnitude(&self) -> Decimal {
        self.amount.abs()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRecord {
    pub id: Option<i64>,
    pub kind: TransactionKind,
    pub status: LedgerStatus,
    pub date: NaiveDate,
    /// Unsigned magnitude; direction comes from `kind` and the account legs.
    pub amount: Decimal,
    pub description: String,
    pub acc_from: Option<i64>,
    pub acc_to: Option<i64>,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    pub origin_ref: Option<i64>,
    pub recurring_ref: Option<i64>,
}

impl LedgerRecord {
    pub fn classification(&self) -> Option<Classification> {
        self.category_id.map(|category_id| Classification {
            category_id,
            subcategory_id: self.subcategory_id.unwrap_or(0),
        })
    }
}
