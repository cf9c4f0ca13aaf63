use std::str::FromStr;

use chrono::NaiveDate;
use comfy_table::{Cell, Table};
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::cli::open_db;
use crate::db::{account_id_by_name, insert_ledger_record, ledger_from_row, LEDGER_COLUMNS};
use crate::error::{LedgerError, Result};
use crate::fmt::money;
use crate::models::{LedgerRecord, LedgerStatus, TransactionKind};

pub struct ManualEntry<'a> {
    pub kind: &'a str,
    pub date: &'a str,
    pub amount: &'a str,
    pub status: &'a str,
    pub description: &'a str,
    pub from: Option<&'a str>,
    pub to: Option<&'a str>,
}

/// Validate a hand-entered transaction and resolve its account names.
pub fn build_record(conn: &Connection, entry: &ManualEntry<'_>) -> Result<LedgerRecord> {
    let kind: TransactionKind = entry.kind.parse()?;
    let status: LedgerStatus = entry.status.parse()?;
    let date = NaiveDate::parse_from_str(entry.date.trim(), "%Y-%m-%d")
        .map_err(|_| LedgerError::InvalidDate(entry.date.to_string()))?;
    let amount = Decimal::from_str(entry.amount.trim())
        .map_err(|_| LedgerError::InvalidAmount(entry.amount.to_string()))?;
    if amount.is_sign_negative() {
        return Err(LedgerError::InvalidAmount(format!(
            "{} (enter the magnitude; direction comes from --kind)",
            entry.amount
        )));
    }

    let acc_from = entry.from.map(|name| account_id_by_name(conn, name)).transpose()?;
    let acc_to = entry.to.map(|name| account_id_by_name(conn, name)).transpose()?;
    let legs_ok = match kind {
        TransactionKind::Expense => acc_from.is_some() && acc_to.is_none(),
        TransactionKind::Income => acc_from.is_none() && acc_to.is_some(),
        TransactionKind::Transfer => acc_from.is_some() && acc_to.is_some(),
    };
    if !legs_ok {
        return Err(LedgerError::Other(format!(
            "{kind} needs {}",
            match kind {
                TransactionKind::Expense => "--from only",
                TransactionKind::Income => "--to only",
                TransactionKind::Transfer => "both --from and --to",
            }
        )));
    }

    Ok(LedgerRecord {
        id: None,
        kind,
        status,
        date,
        amount,
        description: entry.description.to_string(),
        acc_from,
        acc_to,
        category_id: None,
        subcategory_id: None,
        origin_ref: None,
        recurring_ref: None,
    })
}

pub fn add(entry: &ManualEntry<'_>) -> Result<()> {
    let conn = open_db()?;
    let record = build_record(&conn, entry)?;
    let id = insert_ledger_record(&conn, &record)?;
    println!(
        "Added {} {} {} on {} (ID {id})",
        record.status,
        record.kind,
        money(record.amount),
        record.date
    );
    Ok(())
}

pub fn list(status: Option<&str>, limit: usize) -> Result<()> {
    let conn = open_db()?;
    let status: Option<LedgerStatus> = status.map(str::parse).transpose()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {LEDGER_COLUMNS} FROM transactions \
         WHERE ?1 IS NULL OR status = ?1 ORDER BY date DESC, id DESC LIMIT ?2"
    ))?;
    let rows = stmt
        .query_map(rusqlite::params![status, limit as i64], ledger_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Date", "Kind", "Status", "Amount", "Description", "From", "To", "Category", "Import",
    ]);
    for rec in rows {
        let opt = |v: Option<i64>| v.map(|v| v.to_string()).unwrap_or_default();
        table.add_row(vec![
            Cell::new(opt(rec.id)),
            Cell::new(rec.date),
            Cell::new(rec.kind),
            Cell::new(rec.status),
            Cell::new(money(rec.amount)),
            Cell::new(rec.description),
            Cell::new(opt(rec.acc_from)),
            Cell::new(opt(rec.acc_to)),
            Cell::new(
                rec.category_id
                    .map(|c| format!("{c}/{}", rec.subcategory_id.unwrap_or(0)))
                    .unwrap_or_default(),
            ),
            Cell::new(opt(rec.origin_ref)),
        ]);
    }
    println!("Ledger\n{table}");
    Ok(())
}
