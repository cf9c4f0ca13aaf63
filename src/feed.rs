use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{LedgerError, Result};
use crate::guard;
use crate::models::{BookingStatus, NormalizedTransaction};

// ---------------------------------------------------------------------------
// Aggregator payload
// ---------------------------------------------------------------------------

/// One linked bank account's slice of the aggregator response.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountBlock {
    #[serde(deserialize_with = "opaque_id")]
    pub account_id: String,
    #[serde(default)]
    pub requisition_id: Option<Value>,
    #[serde(default)]
    pub transactions: BlockTransactions,
}

/// Rows stay untyped until normalization so one odd row cannot reject the payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockTransactions {
    #[serde(default)]
    pub booked: Vec<Value>,
    #[serde(default)]
    pub pending: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    #[serde(default, deserialize_with = "optional_opaque_id")]
    pub transaction_id: Option<String>,
    #[serde(default, deserialize_with = "optional_opaque_id")]
    pub internal_transaction_id: Option<String>,
    pub booking_date: Option<String>,
    pub value_date: Option<String>,
    pub transaction_amount: Option<RawAmount>,
    pub remittance_information_unstructured: Option<String>,
    pub creditor_name: Option<String>,
    pub debtor_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAmount {
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Accepts ids sent either as JSON strings or numbers.
fn opaque_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unsupported account id: {other}"))),
    }
}

fn optional_opaque_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Parse the raw aggregator JSON. A payload that is not the expected shape is fatal for the batch.
pub fn parse_feed(payload: &str) -> Result<Vec<AccountBlock>> {
    serde_json::from_str(payload).map_err(|e| LedgerError::InvalidFeed(e.to_string()))
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

pub fn parse_amount(raw: &Value) -> Result<Decimal> {
    let text = match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => return Err(LedgerError::InvalidAmount(other.to_string())),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| LedgerError::InvalidAmount(text))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    // Some banks send a full timestamp in the date field; keep the calendar day.
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| LedgerError::InvalidDate(raw.to_string()))
}

impl RawTransaction {
    fn date(&self) -> Result<NaiveDate> {
        let raw = self
            .booking_date
            .as_deref()
            .or(self.value_date.as_deref())
            .ok_or_else(|| LedgerError::InvalidDate("missing".to_string()))?;
        parse_date(raw)
    }

    fn description(&self) -> String {
        [
            &self.remittance_information_unstructured,
            &self.creditor_name,
            &self.debtor_name,
        ]
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
    }

    fn normalize(&self, status: BookingStatus, linked_account_id: i64) -> Result<NormalizedTransaction> {
        let date = self.date()?;
        let money = self
            .transaction_amount
            .as_ref()
            .ok_or_else(|| LedgerError::InvalidAmount("missing".to_string()))?;
        let amount = money
            .amount
            .as_ref()
            .ok_or_else(|| LedgerError::InvalidAmount("missing".to_string()))
            .and_then(parse_amount)?;
        let currency = money.currency.clone().unwrap_or_default();
        let description = self.description();
        let bank_transaction_id = self
            .transaction_id
            .clone()
            .or_else(|| self.internal_transaction_id.clone())
            .filter(|id| !id.trim().is_empty());
        let token = match &bank_transaction_id {
            Some(id) => id.clone(),
            None => guard::content_token(date, amount, &currency, &description),
        };
        Ok(NormalizedTransaction {
            external_id: guard::external_id(linked_account_id, &token),
            bank_transaction_id,
            booking_status: status,
            amount,
            currency,
            date,
            description,
            linked_account_id,
        })
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Normalized {
    /// Ascending by date; rows sharing a date keep feed order.
    pub transactions: Vec<NormalizedTransaction>,
    /// Rows rejected for a bad date or amount.
    pub dropped: usize,
    /// Aggregator account ids with no linked ledger account.
    pub unlinked: Vec<String>,
}

/// Flatten all blocks into one date-ordered stream of normalized transactions.
///
/// Blocks whose account is not linked are reported in `unlinked` and skipped.
/// Rows with an unparsable date or amount are dropped with a warning.
pub fn normalize(blocks: &[AccountBlock], links: &HashMap<String, i64>) -> Normalized {
    let mut out = Normalized::default();

    for block in blocks {
        let Some(&linked_account_id) = links.get(&block.account_id) else {
            warn!(bank_account = %block.account_id, "feed block for unlinked account skipped");
            out.unlinked.push(block.account_id.clone());
            continue;
        };
        debug!(
            bank_account = %block.account_id,
            requisition = ?block.requisition_id,
            account = linked_account_id,
            booked = block.transactions.booked.len(),
            pending = block.transactions.pending.len(),
            "reading feed block"
        );

        let rows = block
            .transactions
            .booked
            .iter()
            .map(|t| (BookingStatus::Booked, t))
            .chain(block.transactions.pending.iter().map(|t| (BookingStatus::Pending, t)));

        for (status, row) in rows {
            let parsed = RawTransaction::deserialize(row)
                .map_err(|e| LedgerError::InvalidFeed(e.to_string()))
                .and_then(|raw| raw.normalize(status, linked_account_id));
            match parsed {
                Ok(txn) => out.transactions.push(txn),
                Err(e) => {
                    warn!(
                        account = linked_account_id,
                        transaction_id = %row.get("transactionId").unwrap_or(&serde_json::Value::Null),
                        error = %e,
                        "dropping feed row"
                    );
                    out.dropped += 1;
                }
            }
        }
    }

    out.transactions.sort_by_key(|t| t.date);
    debug!(
        count = out.transactions.len(),
        dropped = out.dropped,
        "feed normalized"
    );
    out
}
