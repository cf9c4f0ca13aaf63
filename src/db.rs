use std::collections::HashMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::{LedgerError, Result};
use crate::models::{from_cents, to_cents, Account, LedgerRecord};

pub const DB_FILE: &str = "homeledger.db";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    account_type TEXT NOT NULL,
    institution TEXT,
    bank_account_id TEXT UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS fetches (
    id INTEGER PRIMARY KEY,
    source TEXT NOT NULL,
    checksum TEXT NOT NULL,
    record_count INTEGER,
    date_range_start TEXT,
    date_range_end TEXT,
    created INTEGER DEFAULT 0,
    updated INTEGER DEFAULT 0,
    duplicates INTEGER DEFAULT 0,
    failed INTEGER DEFAULT 0,
    started_at TEXT DEFAULT (datetime('now')),
    finished_at TEXT
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    kind TEXT NOT NULL CHECK (kind IN ('income', 'expense', 'transfer')),
    status INTEGER NOT NULL CHECK (status IN (1, 2, 3)),
    date TEXT NOT NULL,
    amount_cents INTEGER NOT NULL CHECK (amount_cents >= 0),
    description TEXT NOT NULL DEFAULT '',
    acc_from INTEGER,
    acc_to INTEGER,
    category_id INTEGER,
    subcategory_id INTEGER,
    origin_ref INTEGER,
    recurring_ref INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT,
    FOREIGN KEY (acc_from) REFERENCES accounts(id),
    FOREIGN KEY (acc_to) REFERENCES accounts(id),
    FOREIGN KEY (origin_ref) REFERENCES raw_imports(id)
);

CREATE INDEX IF NOT EXISTS idx_transactions_match
    ON transactions (kind, date, status);

CREATE TABLE IF NOT EXISTS raw_imports (
    id INTEGER PRIMARY KEY,
    external_id TEXT NOT NULL UNIQUE,
    fetch_id INTEGER,
    linked_account_id INTEGER NOT NULL,
    bank_transaction_id TEXT,
    booking_status TEXT NOT NULL CHECK (booking_status IN ('booked', 'pending')),
    date TEXT NOT NULL,
    amount_cents INTEGER NOT NULL,
    currency TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    kind TEXT NOT NULL,
    status INTEGER NOT NULL,
    acc_from INTEGER,
    acc_to INTEGER,
    disposition TEXT NOT NULL DEFAULT 'pending'
        CHECK (disposition IN ('pending', 'created', 'updated', 'duplicate')),
    ledger_ref INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (fetch_id) REFERENCES fetches(id),
    FOREIGN KEY (linked_account_id) REFERENCES accounts(id),
    FOREIGN KEY (ledger_ref) REFERENCES transactions(id)
);

CREATE TABLE IF NOT EXISTS match_patterns (
    id INTEGER PRIMARY KEY,
    pattern TEXT NOT NULL UNIQUE,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        account_type: row.get(2)?,
        institution: row.get(3)?,
        bank_account_id: row.get(4)?,
    })
}

pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, account_type, institution, bank_account_id FROM accounts ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], account_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn account_id_by_name(conn: &Connection, name: &str) -> Result<i64> {
    conn.query_row("SELECT id FROM accounts WHERE name = ?1", [name], |row| row.get(0))
        .optional()?
        .ok_or_else(|| LedgerError::UnknownAccount(name.to_string()))
}

/// Aggregator account id -> ledger account id, for every linked account.
pub fn bank_links(conn: &Connection) -> Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare(
        "SELECT bank_account_id, id FROM accounts WHERE bank_account_id IS NOT NULL",
    )?;
    let links = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;
    Ok(links)
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

pub const LEDGER_COLUMNS: &str = "id, kind, status, date, amount_cents, description, acc_from, acc_to, \
     category_id, subcategory_id, origin_ref, recurring_ref";

pub fn ledger_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerRecord> {
    Ok(LedgerRecord {
        id: row.get(0)?,
        kind: row.get(1)?,
        status: row.get(2)?,
        date: row.get(3)?,
        amount: from_cents(row.get(4)?),
        description: row.get(5)?,
        acc_from: row.get(6)?,
        acc_to: row.get(7)?,
        category_id: row.get(8)?,
        subcategory_id: row.get(9)?,
        origin_ref: row.get(10)?,
        recurring_ref: row.get(11)?,
    })
}

pub fn get_ledger_record(conn: &Connection, id: i64) -> Result<Option<LedgerRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {LEDGER_COLUMNS} FROM transactions WHERE id = ?1"),
            [id],
            ledger_from_row,
        )
        .optional()?;
    Ok(record)
}

pub fn insert_ledger_record(conn: &Connection, record: &LedgerRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions (kind, status, date, amount_cents, description, acc_from, acc_to, \
         category_id, subcategory_id, origin_ref, recurring_ref) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            record.kind,
            record.status,
            record.date,
            to_cents(record.amount.abs())?,
            record.description,
            record.acc_from,
            record.acc_to,
            record.category_id,
            record.subcategory_id,
            record.origin_ref,
            record.recurring_ref,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}
