use crate::models::{Classification, LedgerRecord};

/// Assigns a classification to a ledger record touched by an import.
///
/// Anything `Fn(&LedgerRecord) -> Classification` fits, so a rules engine can
/// replace [`uncategorized`] without touching the merge path.
pub trait Classifier {
    fn classify(&self, record: &LedgerRecord) -> Classification;
}

impl<F> Classifier for F
where
    F: Fn(&LedgerRecord) -> Classification,
{
    fn classify(&self, record: &LedgerRecord) -> Classification {
        self(record)
    }
}

/// Placeholder rule pass: keep what the user chose, otherwise mark uncategorized.
pub fn uncategorized(record: &LedgerRecord) -> Classification {
    record
        .classification()
        .unwrap_or(Classification::UNCATEGORIZED)
}
