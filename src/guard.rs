use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Stable identifier for one feed transaction: `{linked_account_id}-{token}`.
///
/// `token` is the aggregator's transaction id when it has one. Overlapping
/// fetch windows return the same id, so the same row is never staged twice.
pub fn external_id(linked_account_id: i64, token: &str) -> String {
    format!("{linked_account_id}-{token}")
}

/// Token for feed rows that carry no aggregator id at all.
pub fn content_token(date: NaiveDate, amount: Decimal, currency: &str, description: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{date}|{}|{currency}|{}", amount.normalize(), description.trim()));
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

/// True when this external id was already staged by an earlier run.
pub fn is_staged(conn: &Connection, external_id: &str) -> Result<bool> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM raw_imports WHERE external_id = ?1")?;
    Ok(stmt.exists([external_id])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_external_id_format() {
        assert_eq!(external_id(7, "tx-123"), "7-tx-123");
    }

    #[test]
    fn test_content_token_is_stable() {
        let a = content_token(date("2025-03-10"), dec!(-42.50), "GBP", "TESCO STORES");
        let b = content_token(date("2025-03-10"), dec!(-42.5), "GBP", " TESCO STORES ");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        let c = content_token(date("2025-03-11"), dec!(-42.50), "GBP", "TESCO STORES");
        assert_ne!(a, c);
    }

    #[test]
    fn test_is_staged() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", Some("bank-1"));
        assert!(!is_staged(&conn, "1-abc").unwrap());
        conn.execute(
            "INSERT INTO raw_imports (external_id, linked_account_id, booking_status, date, amount_cents, kind, status) \
             VALUES ('1-abc', ?1, 'booked', '2025-01-01', -100, 'expense', 3)",
            [acct],
        )
        .unwrap();
        assert!(is_staged(&conn, "1-abc").unwrap());
        assert!(!is_staged(&conn, "1-abd").unwrap());
    }
}
