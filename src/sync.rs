use std::path::PathBuf;

use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, info_span, warn};

use crate::categorizer::Classifier;
use crate::db;
use crate::error::{LedgerError, Result};
use crate::feed;
use crate::guard;
use crate::lock::acquire_account_lock;
use crate::matcher;
use crate::merger::{self, MergeOutcome};
use crate::models::{Disposition, NormalizedTransaction};
use crate::patterns::active_patterns;
use crate::staging;

pub struct SyncContext<'a> {
    /// Where the payload came from; recorded on the fetch row.
    pub source: String,
    pub lock_dir: PathBuf,
    pub classifier: &'a dyn Classifier,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub fetch_id: Option<i64>,
    pub created: usize,
    pub updated: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// Feed rows the normalizer rejected.
    pub dropped: usize,
    /// Rows skipped because another run held their account's lock.
    pub locked: usize,
    pub unlinked_accounts: Vec<String>,
    /// Set when the store became unusable mid-batch.
    pub aborted: Option<String>,
}

/// Reconcile one aggregator payload against the ledger.
///
/// Fatal problems (unparsable payload, no linked accounts, store errors before
/// the first transaction) return `Err`. After that, each transaction commits or
/// rolls back on its own and failures only show up in the summary counts.
pub fn sync_feed(conn: &mut Connection, payload: &str, ctx: &SyncContext<'_>) -> Result<SyncSummary> {
    let _span = info_span!("sync", source = %ctx.source).entered();

    let blocks = feed::parse_feed(payload)?;
    let links = db::bank_links(conn)?;
    if links.is_empty() {
        return Err(LedgerError::NoLinkedAccounts);
    }
    let normalized = feed::normalize(&blocks, &links);
    if !blocks.is_empty() && normalized.unlinked.len() == blocks.len() {
        return Err(LedgerError::NoLinkedAccounts);
    }

    let fetch_id = start_fetch(conn, payload, &ctx.source, &normalized.transactions)?;
    let patterns = active_patterns(conn)?;
    let mut summary = SyncSummary {
        fetch_id: Some(fetch_id),
        dropped: normalized.dropped,
        unlinked_accounts: normalized.unlinked.clone(),
        ..SyncSummary::default()
    };
    info!(
        fetch_id,
        transactions = normalized.transactions.len(),
        dropped = normalized.dropped,
        patterns = patterns.len(),
        "sync started"
    );

    'accounts: for (account_id, txns) in by_account(&normalized.transactions) {
        let _lock = match acquire_account_lock(&ctx.lock_dir, account_id) {
            Ok(lock) => lock,
            Err(LedgerError::AccountLocked(_)) => {
                warn!(account = account_id, skipped = txns.len(), "account is locked by another run");
                summary.locked += txns.len();
                continue;
            }
            Err(e) => {
                error!(account = account_id, error = %e, "cannot lock account; aborting batch");
                summary.aborted = Some(e.to_string());
                break;
            }
        };

        for txn in txns {
            match process_one(conn, txn, fetch_id, &patterns, ctx.classifier) {
                Ok(None) => summary.duplicates += 1,
                Ok(Some(outcome)) => match outcome.disposition {
                    Disposition::Created => summary.created += 1,
                    Disposition::Updated => summary.updated += 1,
                    Disposition::Pending | Disposition::Duplicate => {}
                },
                Err(e) if e.is_store_fatal() => {
                    error!(external_id = %txn.external_id, error = %e, "store unusable; aborting batch");
                    summary.aborted = Some(e.to_string());
                    break 'accounts;
                }
                Err(e) => {
                    error!(external_id = %txn.external_id, error = %e, "transaction rolled back");
                    summary.failed += 1;
                }
            }
        }
    }

    if let Err(e) = finish_fetch(conn, fetch_id, &summary) {
        if summary.aborted.is_none() {
            return Err(e);
        }
        warn!(error = %e, "could not record fetch totals");
    }
    info!(
        created = summary.created,
        updated = summary.updated,
        duplicates = summary.duplicates,
        failed = summary.failed,
        dropped = summary.dropped,
        locked = summary.locked,
        "sync finished"
    );
    Ok(summary)
}

/// Stage, match and merge one transaction inside its own SQLite transaction.
/// `Ok(None)` means the external id was already staged and nothing was written.
fn process_one(
    conn: &mut Connection,
    txn: &NormalizedTransaction,
    fetch_id: i64,
    patterns: &[String],
    classifier: &dyn Classifier,
) -> Result<Option<MergeOutcome>> {
    let tx = conn.transaction()?;
    if guard::is_staged(&tx, &txn.external_id)? {
        debug!(external_id = %txn.external_id, "already staged; skipping");
        return Ok(None);
    }
    let staged = staging::stage(&tx, txn, Some(fetch_id))?;
    let verdict = matcher::find_match(&tx, &staged, patterns)?;
    let outcome = merger::apply(&tx, &staged, &verdict, classifier)?;
    tx.commit()?;
    Ok(Some(outcome))
}

/// Split the date-ordered stream per linked account, keeping date order inside each.
fn by_account(txns: &[NormalizedTransaction]) -> Vec<(i64, Vec<&NormalizedTransaction>)> {
    let mut groups: Vec<(i64, Vec<&NormalizedTransaction>)> = Vec::new();
    for txn in txns {
        match groups.iter_mut().find(|(id, _)| *id == txn.linked_account_id) {
            Some((_, group)) => group.push(txn),
            None => groups.push((txn.linked_account_id, vec![txn])),
        }
    }
    groups
}

fn start_fetch(
    conn: &Connection,
    payload: &str,
    source: &str,
    txns: &[NormalizedTransaction],
) -> Result<i64> {
    let checksum = hex::encode(Sha256::digest(payload.as_bytes()));
    let mut stmt = conn.prepare("SELECT 1 FROM fetches WHERE checksum = ?1")?;
    if stmt.exists([&checksum])? {
        info!(checksum = %checksum, "payload was synced before; already-staged rows will be skipped");
    }

    let first = txns.iter().map(|t| t.date).min();
    let last = txns.iter().map(|t| t.date).max();
    conn.execute(
        "INSERT INTO fetches (source, checksum, record_count, date_range_start, date_range_end) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![source, checksum, txns.len() as i64, first, last],
    )?;
    Ok(conn.last_insert_rowid())
}

fn finish_fetch(conn: &Connection, fetch_id: i64, summary: &SyncSummary) -> Result<()> {
    conn.execute(
        "UPDATE fetches SET created = ?1, updated = ?2, duplicates = ?3, failed = ?4, \
         finished_at = datetime('now') WHERE id = ?5",
        rusqlite::params![
            summary.created as i64,
            summary.updated as i64,
            summary.duplicates as i64,
            summary.failed as i64,
            fetch_id,
        ],
    )?;
    Ok(())
}
