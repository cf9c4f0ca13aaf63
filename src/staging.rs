use rusqlite::{Connection, Row};
use rust_decimal::Decimal;

use crate::error::Result;
use crate::models::{
    from_cents, to_cents, BookingStatus, Disposition, LedgerStatus, NormalizedTransaction,
    StagingRecord, TransactionKind,
};

/// Ledger-facing fields implied by a feed transaction's sign and booking status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derived {
    pub kind: TransactionKind,
    pub status: LedgerStatus,
    pub acc_from: Option<i64>,
    pub acc_to: Option<i64>,
}

pub fn derive(txn: &NormalizedTransaction) -> Derived {
    let account = Some(txn.linked_account_id);
    let (kind, acc_from, acc_to) = if txn.amount > Decimal::ZERO {
        (TransactionKind::Income, None, account)
    } else {
        (TransactionKind::Expense, account, None)
    };
    let status = match txn.booking_status {
        BookingStatus::Booked => LedgerStatus::Complete,
        BookingStatus::Pending => LedgerStatus::Processing,
    };
    Derived {
        kind,
        status,
        acc_from,
        acc_to,
    }
}

const STAGING_COLUMNS: &str = "id, external_id, linked_account_id, booking_status, date, amount_cents, \
     currency, description, kind, status, acc_from, acc_to, disposition, ledger_ref";

fn staging_from_row(row: &Row<'_>) -> rusqlite::Result<StagingRecord> {
    Ok(StagingRecord {
        id: row.get(0)?,
        external_id: row.get(1)?,
        linked_account_id: row.get(2)?,
        booking_status: row.get(3)?,
        date: row.get(4)?,
        amount: from_cents(row.get(5)?),
        currency: row.get(6)?,
        description: row.get(7)?,
        kind: row.get(8)?,
        status: row.get(9)?,
        acc_from: row.get(10)?,
        acc_to: row.get(11)?,
        disposition: row.get(12)?,
        ledger_ref: row.get(13)?,
    })
}

/// Write the raw row with disposition `pending`. Fails on a repeated external id.
pub fn stage(
    conn: &Connection,
    txn: &NormalizedTransaction,
    fetch_id: Option<i64>,
) -> Result<StagingRecord> {
    let derived = derive(txn);
    conn.execute(
        "INSERT INTO raw_imports (external_id, fetch_id, linked_account_id, bank_transaction_id, \
         booking_status, date, amount_cents, currency, description, kind, status, acc_from, acc_to, \
         disposition) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        rusqlite::params![
            txn.external_id,
            fetch_id,
            txn.linked_account_id,
            txn.bank_transaction_id,
            txn.booking_status,
            txn.date,
            to_cents(txn.amount)?,
            txn.currency,
            txn.description,
            derived.kind,
            derived.status,
            derived.acc_from,
            derived.acc_to,
            Disposition::Pending,
        ],
    )?;
    Ok(StagingRecord {
        id: conn.last_insert_rowid(),
        external_id: txn.external_id.clone(),
        linked_account_id: txn.linked_account_id,
        booking_status: txn.booking_status,
        date: txn.date,
        amount: txn.amount,
        currency: txn.currency.clone(),
        description: txn.description.clone(),
        kind: derived.kind,
        status: derived.status,
        acc_from: derived.acc_from,
        acc_to: derived.acc_to,
        disposition: Disposition::Pending,
        ledger_ref: None,
    })
}

pub fn mark(
    conn: &Connection,
    staging_id: i64,
    disposition: Disposition,
    ledger_ref: Option<i64>,
) -> Result<()> {
    conn.execute(
        "UPDATE raw_imports SET disposition = ?1, ledger_ref = ?2 WHERE id = ?3",
        rusqlite::params![disposition, ledger_ref, staging_id],
    )?;
    Ok(())
}

#[cfg(test)]
pub fn get(conn: &Connection, id: i64) -> Result<Option<StagingRecord>> {
    use rusqlite::OptionalExtension;
    let record = conn
        .query_row(
            &format!("SELECT {STAGING_COLUMNS} FROM raw_imports WHERE id = ?1"),
            [id],
            staging_from_row,
        )
        .optional()?;
    Ok(record)
}

/// Most recent staged rows first.
pub fn recent(conn: &Connection, limit: usize) -> Result<Vec<StagingRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STAGING_COLUMNS} FROM raw_imports ORDER BY id DESC LIMIT ?1"
    ))?;
    let rows = stmt
        .query_map([limit as i64], staging_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
