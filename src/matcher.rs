//! Finds the single existing ledger record a feed transaction stands for.
//!
//! Strategies run in a fixed order, from strict to loose. Each one queries
//! the store afresh. A strategy that finds exactly one candidate wins; one
//! that finds several stops the search with [`Verdict::Ambiguous`] so the
//! caller creates a new record instead of attaching to a guess.

use chrono::{Duration, NaiveDate};
use rusqlite::{named_params, Connection};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::models::{to_cents, BookingStatus, LedgerStatus, StagingRecord, TransactionKind};

/// Days searched backwards for the pending charge a booked entry settles.
pub const PENDING_LOOKBACK_DAYS: i64 = 10;

/// Day offsets for the near-date window, in search order.
pub const NEAR_DATE_OFFSETS: [i64; 10] = [-1, 1, -2, 2, -3, 3, -4, -5, -6, -7];

/// Days searched backwards by the description-pattern fallback.
pub const PATTERN_LOOKBACK_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ExactDate,
    PendingPromotion,
    NearDate,
    DescriptionPattern,
    ZeroAmountForecast,
    ToleranceForecast,
}

impl Strategy {
    pub fn step(&self) -> u8 {
        match self {
            Self::ExactDate => 1,
            Self::PendingPromotion => 2,
            Self::NearDate => 3,
            Self::DescriptionPattern => 4,
            Self::ZeroAmountForecast => 5,
            Self::ToleranceForecast => 6,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ExactDate => "exact date",
            Self::PendingPromotion => "pending promotion",
            Self::NearDate => "near date",
            Self::DescriptionPattern => "description pattern",
            Self::ZeroAmountForecast => "zero-amount forecast",
            Self::ToleranceForecast => "amount-tolerant forecast",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Matched { ledger_id: i64, strategy: Strategy },
    /// More than one candidate qualified at `strategy`; nothing was picked.
    Ambiguous { strategy: Strategy },
    NoMatch,
}

impl Verdict {
    pub fn ledger_id(&self) -> Option<i64> {
        match self {
            Self::Matched { ledger_id, .. } => Some(*ledger_id),
            _ => None,
        }
    }
}

/// Outcome of one store probe. Only "none", "exactly one" and "more" matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Empty,
    One(i64),
    Many,
}

impl Probe {
    fn from_ids(ids: &[i64]) -> Self {
        match ids {
            [] => Self::Empty,
            [id] => Self::One(*id),
            _ => Self::Many,
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::One(_) => 1,
            Self::Many => 2,
        }
    }

    fn verdict(self, strategy: Strategy) -> Option<Verdict> {
        match self {
            Self::Empty => None,
            Self::One(ledger_id) => Some(Verdict::Matched { ledger_id, strategy }),
            Self::Many => Some(Verdict::Ambiguous { strategy }),
        }
    }
}

// Candidates: same kind, at least one account leg in common, inside the status
// range and amount band, and not already claimed by an import. A record claimed
// by a still-pending import stays open, but only to booked entries settling it.
const CANDIDATES_SQL: &str = "
SELECT t.id, t.description FROM transactions t
WHERE t.kind = :kind
  AND t.date = :date
  AND t.status BETWEEN :status_lo AND :status_hi
  AND t.status < 3
  AND (t.acc_from = :acc_from OR t.acc_to = :acc_to)
  AND t.amount_cents BETWEEN :amount_lo AND :amount_hi
  AND (t.origin_ref IS NULL
       OR (:booked = 1 AND EXISTS (
             SELECT 1 FROM raw_imports r WHERE r.id = t.origin_ref AND r.status < 3)))
ORDER BY t.id
";

/// One parameterized candidate search.
#[derive(Debug, Clone, Copy)]
struct Criteria {
    kind: TransactionKind,
    date: NaiveDate,
    statuses: (LedgerStatus, LedgerStatus),
    acc_from: Option<i64>,
    acc_to: Option<i64>,
    amount_cents: (i64, i64),
    booked: bool,
}

impl Criteria {
    fn on(self, date: NaiveDate) -> Self {
        Self { date, ..self }
    }

    fn statuses(self, lo: LedgerStatus, hi: LedgerStatus) -> Self {
        Self { statuses: (lo, hi), ..self }
    }

    fn amount(self, lo: i64, hi: i64) -> Self {
        Self { amount_cents: (lo, hi), ..self }
    }

    fn rows(&self, conn: &Connection) -> Result<Vec<(i64, String)>> {
        let mut stmt = conn.prepare_cached(CANDIDATES_SQL)?;
        let rows = stmt
            .query_map(
                named_params! {
                    ":kind": self.kind,
                    ":date": self.date,
                    ":status_lo": self.statuses.0,
                    ":status_hi": self.statuses.1,
                    ":acc_from": self.acc_from,
                    ":acc_to": self.acc_to,
                    ":amount_lo": self.amount_cents.0,
                    ":amount_hi": self.amount_cents.1,
                    ":booked": self.booked,
                },
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn probe(&self, conn: &Connection, strategy: Strategy) -> Result<Probe> {
        let ids: Vec<i64> = self.rows(conn)?.into_iter().map(|(id, _)| id).collect();
        let probe = Probe::from_ids(&ids);
        debug!(
            step = strategy.step(),
            strategy = strategy.label(),
            date = %self.date,
            amount_lo = self.amount_cents.0,
            amount_hi = self.amount_cents.1,
            candidates = probe.len(),
            "probe"
        );
        Ok(probe)
    }
}

/// ±1.00 below 10.00, otherwise ±10% of the amount.
pub fn tolerance(amount: Decimal) -> Decimal {
    if amount < Decimal::TEN {
        Decimal::ONE
    } else {
        amount / Decimal::TEN
    }
}

/// Search the ledger for the record `staged` represents.
///
/// `patterns` is the user's description pattern list, in priority order.
#[instrument(name = "match", skip_all, fields(external_id = %staged.external_id))]
pub fn find_match(conn: &Connection, staged: &StagingRecord, patterns: &[String]) -> Result<Verdict> {
    let verdict = search(conn, staged, patterns)?;
    match verdict {
        Verdict::Matched { ledger_id, strategy } => info!(
            ledger_id,
            step = strategy.step(),
            strategy = strategy.label(),
            "matched existing record"
        ),
        Verdict::Ambiguous { strategy } => info!(
            step = strategy.step(),
            strategy = strategy.label(),
            "ambiguous candidates; no match"
        ),
        Verdict::NoMatch => info!("no candidate found"),
    }
    Ok(verdict)
}

fn search(conn: &Connection, staged: &StagingRecord, patterns: &[String]) -> Result<Verdict> {
    let magnitude = staged.magnitude();
    let cents = to_cents(magnitude)?;
    let booked = staged.booking_status == BookingStatus::Booked;
    let base = Criteria {
        kind: staged.kind,
        date: staged.date,
        statuses: (LedgerStatus::Forecast, LedgerStatus::Processing),
        acc_from: staged.acc_from,
        acc_to: staged.acc_to,
        amount_cents: (cents, cents),
        booked,
    };
    debug!(
        kind = %staged.kind,
        date = %staged.date,
        amount = %magnitude,
        acc_from = ?staged.acc_from,
        acc_to = ?staged.acc_to,
        booked,
        "searching ledger"
    );

    // 1. Exact date, exact amount.
    if let Some(v) = base.probe(conn, Strategy::ExactDate)?.verdict(Strategy::ExactDate) {
        return Ok(v);
    }

    // 2. A booked entry settling a pending charge seen in the days before.
    if booked {
        let pending = base.statuses(LedgerStatus::Processing, LedgerStatus::Processing);
        for back in 1..=PENDING_LOOKBACK_DAYS {
            let probe = pending
                .on(staged.date - Duration::days(back))
                .probe(conn, Strategy::PendingPromotion)?;
            if let Some(v) = probe.verdict(Strategy::PendingPromotion) {
                return Ok(v);
            }
        }
    }

    // 3. Near-date window.
    for offset in NEAR_DATE_OFFSETS {
        let probe = base
            .on(staged.date + Duration::days(offset))
            .probe(conn, Strategy::NearDate)?;
        if let Some(v) = probe.verdict(Strategy::NearDate) {
            return Ok(v);
        }
    }

    // 4. Description patterns, expenses only.
    if staged.kind == TransactionKind::Expense {
        if let Some(v) = match_description(conn, staged, &base, patterns)? {
            return Ok(v);
        }
    }

    // 5. Forecast placeholder with no amount yet.
    let forecast = base.statuses(LedgerStatus::Forecast, LedgerStatus::Forecast);
    let probe = forecast.amount(0, 0).probe(conn, Strategy::ZeroAmountForecast)?;
    if let Some(v) = probe.verdict(Strategy::ZeroAmountForecast) {
        return Ok(v);
    }

    // 6. Forecast with a roughly right amount.
    let tol = tolerance(magnitude);
    let lo = to_cents((magnitude - tol).max(Decimal::ZERO))?;
    let hi = to_cents(magnitude + tol)?;
    let probe = forecast.amount(lo, hi).probe(conn, Strategy::ToleranceForecast)?;
    if let Some(v) = probe.verdict(Strategy::ToleranceForecast) {
        return Ok(v);
    }

    Ok(Verdict::NoMatch)
}

fn match_description(
    conn: &Connection,
    staged: &StagingRecord,
    base: &Criteria,
    patterns: &[String],
) -> Result<Option<Verdict>> {
    let strategy = Strategy::DescriptionPattern;
    let incoming = staged.description.to_lowercase();
    // A pattern only links two records when both descriptions carry it, so
    // patterns absent from the incoming text never probe and never abort.
    let wanted: Vec<String> = patterns
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty() && incoming.contains(p.as_str()))
        .collect();
    if wanted.is_empty() {
        debug!(step = strategy.step(), "no pattern applies to this description");
        return Ok(None);
    }

    let any_amount = base
        .statuses(LedgerStatus::Processing, LedgerStatus::Processing)
        .amount(0, i64::MAX);
    for back in 1..=PATTERN_LOOKBACK_DAYS {
        let day = staged.date - Duration::days(back);
        let rows = any_amount.on(day).rows(conn)?;
        for pattern in &wanted {
            let ids: Vec<i64> = rows
                .iter()
                .filter(|(_, desc)| desc.to_lowercase().contains(pattern.as_str()))
                .map(|(id, _)| *id)
                .collect();
            let probe = Probe::from_ids(&ids);
            debug!(
                step = strategy.step(),
                strategy = strategy.label(),
                date = %day,
                pattern = %pattern,
                candidates = probe.len(),
                "probe"
            );
            if let Some(v) = probe.verdict(strategy) {
                return Ok(Some(v));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::*;
    use crate::models::{Disposition, LedgerStatus::*, TransactionKind::*};
    use rust_decimal_macros::dec;

    fn staged(
        kind: TransactionKind,
        booking: BookingStatus,
        on: &str,
        amount: Decimal,
        description: &str,
        account: i64,
    ) -> StagingRecord {
        let (acc_from, acc_to, signed) = match kind {
            Income => (None, Some(account), amount),
            _ => (Some(account), None, -amount),
        };
        StagingRecord {
            id: 0,
            external_id: format!("{account}-test"),
            linked_account_id: account,
            booking_status: booking,
            date: date(on),
            amount: signed,
            currency: "GBP".into(),
            description: description.into(),
            kind,
            status: match booking {
                BookingStatus::Booked => Complete,
                BookingStatus::Pending => Processing,
            },
            acc_from,
            acc_to,
            disposition: Disposition::Pending,
            ledger_ref: None,
        }
    }

    fn no_patterns() -> Vec<String> {
        Vec::new()
    }

    #[test]
    fn test_exact_date_match() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        let id = add_ledger(&conn, Expense, Forecast, "2025-03-10", dec!(42.50), "Groceries", acct);
        let s = staged(Expense, BookingStatus::Booked, "2025-03-10", dec!(42.50), "TESCO", acct);
        let v = find_match(&conn, &s, &no_patterns()).unwrap();
        assert_eq!(v, Verdict::Matched { ledger_id: id, strategy: Strategy::ExactDate });
    }

    #[test]
    fn test_exact_date_wins_over_near_date() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        add_ledger(&conn, Expense, Forecast, "2025-03-09", dec!(42.50), "", acct);
        let exact = add_ledger(&conn, Expense, Forecast, "2025-03-10", dec!(42.50), "", acct);
        add_ledger(&conn, Expense, Forecast, "2025-03-11", dec!(42.50), "", acct);
        let s = staged(Expense, BookingStatus::Booked, "2025-03-10", dec!(42.50), "", acct);
        assert_eq!(find_match(&conn, &s, &no_patterns()).unwrap().ledger_id(), Some(exact));
    }

    #[test]
    fn test_ambiguous_exact_date_does_not_fall_through() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        add_ledger(&conn, Expense, Forecast, "2025-03-10", dec!(42.50), "", acct);
        add_ledger(&conn, Expense, Processing, "2025-03-10", dec!(42.50), "", acct);
        // A lone near-date candidate would match if the search fell through.
        add_ledger(&conn, Expense, Forecast, "2025-03-09", dec!(42.50), "", acct);
        let s = staged(Expense, BookingStatus::Booked, "2025-03-10", dec!(42.50), "", acct);
        assert_eq!(
            find_match(&conn, &s, &no_patterns()).unwrap(),
            Verdict::Ambiguous { strategy: Strategy::ExactDate }
        );
    }

    #[test]
    fn test_pending_promotion_two_days_back() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        let id = add_ledger(&conn, Expense, Processing, "2025-03-08", dec!(42.50), "TESCO", acct);
        let s = staged(Expense, BookingStatus::Booked, "2025-03-10", dec!(42.50), "TESCO STORES", acct);
        assert_eq!(
            find_match(&conn, &s, &no_patterns()).unwrap(),
            Verdict::Matched { ledger_id: id, strategy: Strategy::PendingPromotion }
        );
    }

    #[test]
    fn test_pending_promotion_nearest_day_first() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        add_ledger(&conn, Expense, Processing, "2025-03-01", dec!(20), "", acct);
        let near = add_ledger(&conn, Expense, Processing, "2025-03-06", dec!(20), "", acct);
        let s = staged(Expense, BookingStatus::Booked, "2025-03-10", dec!(20), "", acct);
        assert_eq!(find_match(&conn, &s, &no_patterns()).unwrap().ledger_id(), Some(near));
    }

    #[test]
    fn test_pending_promotion_ignores_forecasts_and_pending_feed() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        // Nine days back: outside the near-date window, inside the pending lookback.
        add_ledger(&conn, Expense, Forecast, "2025-03-01", dec!(20), "", acct);
        let booked = staged(Expense, BookingStatus::Booked, "2025-03-10", dec!(20), "", acct);
        assert_eq!(find_match(&conn, &booked, &no_patterns()).unwrap(), Verdict::NoMatch);

        let processing = add_ledger(&conn, Expense, Processing, "2025-03-01", dec!(20), "", acct);
        let pending = staged(Expense, BookingStatus::Pending, "2025-03-10", dec!(20), "", acct);
        assert_eq!(find_match(&conn, &pending, &no_patterns()).unwrap(), Verdict::NoMatch);
        assert_eq!(find_match(&conn, &booked, &no_patterns()).unwrap().ledger_id(), Some(processing));
    }

    #[test]
    fn test_pending_promotion_ambiguous() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        add_ledger(&conn, Expense, Processing, "2025-03-08", dec!(20), "", acct);
        add_ledger(&conn, Expense, Processing, "2025-03-08", dec!(20), "", acct);
        let s = staged(Expense, BookingStatus::Booked, "2025-03-10", dec!(20), "", acct);
        assert_eq!(
            find_match(&conn, &s, &no_patterns()).unwrap(),
            Verdict::Ambiguous { strategy: Strategy::PendingPromotion }
        );
    }

    #[test]
    fn test_near_date_prefers_past_then_future() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        let future = add_ledger(&conn, Income, Forecast, "2025-06-02", dec!(100), "", acct);
        let past = add_ledger(&conn, Income, Forecast, "2025-05-31", dec!(100), "", acct);
        let s = staged(Income, BookingStatus::Booked, "2025-06-01", dec!(100), "", acct);
        assert_eq!(
            find_match(&conn, &s, &no_patterns()).unwrap(),
            Verdict::Matched { ledger_id: past, strategy: Strategy::NearDate }
        );
        conn.execute("DELETE FROM transactions WHERE id = ?1", [past]).unwrap();
        assert_eq!(find_match(&conn, &s, &no_patterns()).unwrap().ledger_id(), Some(future));
    }

    #[test]
    fn test_near_date_window_is_asymmetric() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        let s = staged(Income, BookingStatus::Pending, "2025-06-10", dec!(100), "", acct);

        let ahead = add_ledger(&conn, Income, Forecast, "2025-06-14", dec!(100), "", acct);
        assert_eq!(find_match(&conn, &s, &no_patterns()).unwrap(), Verdict::NoMatch);
        conn.execute("DELETE FROM transactions WHERE id = ?1", [ahead]).unwrap();

        let behind = add_ledger(&conn, Income, Forecast, "2025-06-03", dec!(100), "", acct);
        assert_eq!(find_match(&conn, &s, &no_patterns()).unwrap().ledger_id(), Some(behind));
    }

    #[test]
    fn test_near_date_ambiguous_at_one_offset() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        add_ledger(&conn, Income, Forecast, "2025-06-09", dec!(100), "", acct);
        add_ledger(&conn, Income, Forecast, "2025-06-09", dec!(100), "", acct);
        add_ledger(&conn, Income, Forecast, "2025-06-11", dec!(100), "", acct);
        let s = staged(Income, BookingStatus::Pending, "2025-06-10", dec!(100), "", acct);
        assert_eq!(
            find_match(&conn, &s, &no_patterns()).unwrap(),
            Verdict::Ambiguous { strategy: Strategy::NearDate }
        );
    }

    #[test]
    fn test_kind_and_account_must_align() {
        let (_dir, conn) = test_db();
        let a = add_account(&conn, "Current", None);
        let b = add_account(&conn, "Savings", None);
        add_ledger(&conn, Income, Forecast, "2025-03-10", dec!(42.50), "", a);
        add_ledger(&conn, Expense, Forecast, "2025-03-10", dec!(42.50), "", b);
        add_ledger(&conn, Expense, Complete, "2025-03-10", dec!(42.50), "", a);
        let s = staged(Expense, BookingStatus::Booked, "2025-03-10", dec!(42.50), "", a);
        assert_eq!(find_match(&conn, &s, &no_patterns()).unwrap(), Verdict::NoMatch);
    }

    #[test]
    fn test_description_pattern_fallback() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        let id = add_ledger(&conn, Expense, Processing, "2025-03-05", dec!(30.00), "Amazon order", acct);
        let s = staged(Expense, BookingStatus::Pending, "2025-03-10", dec!(31.99), "AMAZON MKTPLACE", acct);
        assert_eq!(find_match(&conn, &s, &no_patterns()).unwrap(), Verdict::NoMatch);

        let patterns = vec!["amazon".to_string()];
        assert_eq!(
            find_match(&conn, &s, &patterns).unwrap(),
            Verdict::Matched { ledger_id: id, strategy: Strategy::DescriptionPattern }
        );
    }

    #[test]
    fn test_description_pattern_nearest_day_wins() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        add_ledger(&conn, Expense, Processing, "2025-03-04", dec!(12), "AMAZON", acct);
        let near = add_ledger(&conn, Expense, Processing, "2025-03-08", dec!(15), "amazon prime", acct);
        let s = staged(Expense, BookingStatus::Booked, "2025-03-10", dec!(18), "AMAZON.CO.UK", acct);
        let patterns = vec!["Amazon".to_string()];
        assert_eq!(find_match(&conn, &s, &patterns).unwrap().ledger_id(), Some(near));
    }

    #[test]
    fn test_description_pattern_list_order_within_a_day() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        add_ledger(&conn, Expense, Processing, "2025-03-09", dec!(12), "PAYPAL", acct);
        let ebay = add_ledger(&conn, Expense, Processing, "2025-03-09", dec!(14), "EBAY", acct);
        let s = staged(Expense, BookingStatus::Booked, "2025-03-10", dec!(18), "PAYPAL *EBAY", acct);
        let patterns = vec!["ebay".to_string(), "paypal".to_string()];
        assert_eq!(find_match(&conn, &s, &patterns).unwrap().ledger_id(), Some(ebay));
    }

    #[test]
    fn test_description_pattern_ambiguity_aborts() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        add_ledger(&conn, Expense, Processing, "2025-03-09", dec!(12), "Amazon books", acct);
        add_ledger(&conn, Expense, Processing, "2025-03-09", dec!(14), "Amazon music", acct);
        // Would match on a later pattern and on the zero-amount step if the search continued.
        add_ledger(&conn, Expense, Processing, "2025-03-09", dec!(16), "Kindle", acct);
        add_ledger(&conn, Expense, Forecast, "2025-03-10", dec!(0), "", acct);
        let s = staged(Expense, BookingStatus::Booked, "2025-03-10", dec!(18), "AMAZON KINDLE", acct);
        let patterns = vec!["amazon".to_string(), "kindle".to_string()];
        assert_eq!(
            find_match(&conn, &s, &patterns).unwrap(),
            Verdict::Ambiguous { strategy: Strategy::DescriptionPattern }
        );
    }

    #[test]
    fn test_description_pattern_expense_only() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        add_ledger(&conn, Income, Processing, "2025-03-08", dec!(10), "REFUND AMAZON", acct);
        let s = staged(Income, BookingStatus::Booked, "2025-03-10", dec!(12), "AMAZON REFUND", acct);
        let patterns = vec!["amazon".to_string()];
        assert_eq!(find_match(&conn, &s, &patterns).unwrap(), Verdict::NoMatch);
    }

    #[test]
    fn test_zero_amount_forecast_placeholder() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        let id = add_ledger(&conn, Expense, Forecast, "2025-04-01", dec!(0), "Electricity", acct);
        let s = staged(Expense, BookingStatus::Booked, "2025-04-01", dec!(87.12), "EDF ENERGY", acct);
        assert_eq!(
            find_match(&conn, &s, &no_patterns()).unwrap(),
            Verdict::Matched { ledger_id: id, strategy: Strategy::ZeroAmountForecast }
        );
    }

    #[test]
    fn test_zero_amount_forecast_ambiguous() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        add_ledger(&conn, Expense, Forecast, "2025-04-01", dec!(0), "Electricity", acct);
        add_ledger(&conn, Expense, Forecast, "2025-04-01", dec!(0), "Gas", acct);
        // A lone tolerance candidate would match if the search fell through.
        add_ledger(&conn, Expense, Forecast, "2025-04-01", dec!(85), "Water", acct);
        let s = staged(Expense, BookingStatus::Booked, "2025-04-01", dec!(87.12), "EDF ENERGY", acct);
        assert_eq!(
            find_match(&conn, &s, &no_patterns()).unwrap(),
            Verdict::Ambiguous { strategy: Strategy::ZeroAmountForecast }
        );
    }

    #[test]
    fn test_tolerance_forecast_ambiguous() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        add_ledger(&conn, Expense, Forecast, "2025-04-01", dec!(95), "Council tax", acct);
        add_ledger(&conn, Expense, Forecast, "2025-04-01", dec!(105), "Broadband", acct);
        let s = staged(Expense, BookingStatus::Booked, "2025-04-01", dec!(100), "DD PAYMENT", acct);
        assert_eq!(
            find_match(&conn, &s, &no_patterns()).unwrap(),
            Verdict::Ambiguous { strategy: Strategy::ToleranceForecast }
        );
    }

    #[test]
    fn test_tolerance_boundary_small_amounts() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        let id = add_ledger(&conn, Expense, Forecast, "2025-04-01", dec!(9.50), "", acct);
        let close = staged(Expense, BookingStatus::Booked, "2025-04-01", dec!(9.00), "", acct);
        assert_eq!(
            find_match(&conn, &close, &no_patterns()).unwrap(),
            Verdict::Matched { ledger_id: id, strategy: Strategy::ToleranceForecast }
        );
        let far = staged(Expense, BookingStatus::Booked, "2025-04-01", dec!(7.00), "", acct);
        assert_eq!(find_match(&conn, &far, &no_patterns()).unwrap(), Verdict::NoMatch);
    }

    #[test]
    fn test_tolerance_percent_for_larger_amounts() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        let id = add_ledger(&conn, Income, Forecast, "2025-04-25", dec!(2000), "Salary", acct);
        let s = staged(Income, BookingStatus::Booked, "2025-04-25", dec!(2150), "ACME LTD", acct);
        assert_eq!(find_match(&conn, &s, &no_patterns()).unwrap().ledger_id(), Some(id));
        let s = staged(Income, BookingStatus::Booked, "2025-04-25", dec!(2500), "ACME LTD", acct);
        assert_eq!(find_match(&conn, &s, &no_patterns()).unwrap(), Verdict::NoMatch);
    }

    #[test]
    fn test_tolerance_skips_processing_records() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        add_ledger(&conn, Expense, Processing, "2025-04-01", dec!(9.50), "", acct);
        let s = staged(Expense, BookingStatus::Pending, "2025-04-01", dec!(9.00), "", acct);
        assert_eq!(find_match(&conn, &s, &no_patterns()).unwrap(), Verdict::NoMatch);
    }

    #[test]
    fn test_tolerance_values() {
        assert_eq!(tolerance(dec!(9.99)), dec!(1));
        assert_eq!(tolerance(dec!(10)), dec!(1));
        assert_eq!(tolerance(dec!(250)), dec!(25));
    }

    #[test]
    fn test_imported_records_are_not_rematched() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Current", None);
        let id = add_ledger(&conn, Expense, Processing, "2025-03-10", dec!(5), "", acct);
        conn.execute(
            "INSERT INTO raw_imports (external_id, linked_account_id, booking_status, date, amount_cents, kind, status) \
             VALUES ('x', ?1, 'pending', '2025-03-10', -500, 'expense', 2)",
            [acct],
        )
        .unwrap();
        let staging_id = conn.last_insert_rowid();
        conn.execute(
            "UPDATE transactions SET origin_ref = ?1 WHERE id = ?2",
            [staging_id, id],
        )
        .unwrap();

        let pending = staged(Expense, BookingStatus::Pending, "2025-03-10", dec!(5), "", acct);
        assert_eq!(find_match(&conn, &pending, &no_patterns()).unwrap(), Verdict::NoMatch);
        let booked = staged(Expense, BookingStatus::Booked, "2025-03-10", dec!(5), "", acct);
        assert_eq!(find_match(&conn, &booked, &no_patterns()).unwrap().ledger_id(), Some(id));
    }
}
