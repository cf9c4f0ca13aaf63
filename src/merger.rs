use rusqlite::Connection;
use tracing::{debug, info};

use crate::categorizer::Classifier;
use crate::db::{get_ledger_record, insert_ledger_record};
use crate::error::{LedgerError, Result};
use crate::matcher::Verdict;
use crate::models::{to_cents, Disposition, LedgerRecord, StagingRecord};
use crate::staging;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub disposition: Disposition,
    pub ledger_id: i64,
}

/// Apply a match verdict: update the matched record in place, or create a new one.
///
/// Writes the ledger row, its classification and the staging disposition. The
/// caller owns the surrounding SQLite transaction and commits only on `Ok`.
pub fn apply(
    conn: &Connection,
    staged: &StagingRecord,
    verdict: &Verdict,
    classifier: &dyn Classifier,
) -> Result<MergeOutcome> {
    let outcome = match verdict.ledger_id() {
        Some(ledger_id) => update_matched(conn, staged, ledger_id, classifier)?,
        None => create_new(conn, staged, classifier)?,
    };
    staging::mark(conn, staged.id, outcome.disposition, Some(outcome.ledger_id))?;
    Ok(outcome)
}

fn update_matched(
    conn: &Connection,
    staged: &StagingRecord,
    ledger_id: i64,
    classifier: &dyn Classifier,
) -> Result<MergeOutcome> {
    let mut record = get_ledger_record(conn, ledger_id)?
        .ok_or_else(|| LedgerError::Other(format!("Matched ledger record {ledger_id} is gone")))?;
    let before = (record.date, record.status, record.amount);

    record.date = staged.date;
    record.status = staged.status;
    record.amount = staged.magnitude();
    record.origin_ref = Some(staged.id);
    let class = classifier.classify(&record);

    conn.execute(
        "UPDATE transactions SET date = ?1, status = ?2, amount_cents = ?3, origin_ref = ?4, \
         category_id = ?5, subcategory_id = ?6, updated_at = datetime('now') WHERE id = ?7",
        rusqlite::params![
            record.date,
            record.status,
            to_cents(record.amount)?,
            record.origin_ref,
            class.category_id,
            class.subcategory_id,
            ledger_id,
        ],
    )?;
    info!(
        external_id = %staged.external_id,
        ledger_id,
        old_date = %before.0,
        new_date = %record.date,
        old_status = %before.1,
        new_status = %record.status,
        old_amount = %before.2,
        new_amount = %record.amount,
        "updated ledger record"
    );
    Ok(MergeOutcome {
        disposition: Disposition::Updated,
        ledger_id,
    })
}

fn create_new(
    conn: &Connection,
    staged: &StagingRecord,
    classifier: &dyn Classifier,
) -> Result<MergeOutcome> {
    let mut record = LedgerRecord {
        id: None,
        kind: staged.kind,
        status: staged.status,
        date: staged.date,
        amount: staged.magnitude(),
        description: staged.description.clone(),
        acc_from: staged.acc_from,
        acc_to: staged.acc_to,
        category_id: None,
        subcategory_id: None,
        origin_ref: Some(staged.id),
        recurring_ref: None,
    };
    let class = classifier.classify(&record);
    record.category_id = Some(class.category_id);
    record.subcategory_id = Some(class.subcategory_id);

    let ledger_id = insert_ledger_record(conn, &record)?;
    info!(
        external_id = %staged.external_id,
        ledger_id,
        kind = %record.kind,
        status = %record.status,
        date = %record.date,
        amount = %record.amount,
        "created ledger record"
    );
    debug!(ledger_id, category = class.category_id, subcategory = class.subcategory_id, "classified");
    Ok(MergeOutcome {
        disposition: Disposition::Created,
        ledger_id,
    })
}
