// Redemption Engine - period reset and year rollover
//
// Time passing is the only thing that mutates tracking state here:
// 1. Rollover: when today's year is past the active tracking year, archive
//    each card's totals and start the new year with empty period sets.
// 2. Period reset: a checked redemption whose period has ended is unchecked.
//    Its completed period stays recorded so year-to-date totals hold.
//
// `set_checked` is the only user-driven mutation.

use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, warn};

use crate::models::{Ledger, Redemption};
use crate::period::{is_later_period, period_id, year_of};
use crate::summary::archive_year_totals;

/// What a reset pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetOutcome {
    /// Any mutation happened; the caller should persist
    pub changed: bool,
    /// Years archived into yearly summaries during this pass
    pub archived_years: Vec<i32>,
    /// Redemptions unchecked during this pass
    pub unchecked: usize,
}

// ============================================================================
// RESET AND ROLLOVER
// ============================================================================

/// Run the rollover and period reset for `today`.
///
/// Idempotent: a second call with the same `today` and no check in between
/// returns `changed == false` and leaves the ledger untouched.
pub fn reset_and_rollover(ledger: &mut Ledger, today: NaiveDate) -> ResetOutcome {
    let mut outcome = ResetOutcome::default();
    let today_year = today.year();

    let tracking_year = match ledger.active_tracking_year {
        Some(year) => year,
        None => {
            let backfilled = backfill_checked_periods(ledger);
            if backfilled > 0 {
                info!(backfilled, "recorded periods of legacy checked redemptions");
            }
            let year = derive_tracking_year(ledger).unwrap_or(today_year);
            debug!(tracking_year = year, "initialising active tracking year");
            ledger.active_tracking_year = Some(year);
            outcome.changed = true;
            year
        }
    };

    if today_year > tracking_year {
        rollover(ledger, today, &mut outcome);
    } else if today_year < tracking_year {
        warn!(
            tracking_year,
            today = %today,
            "today is before the active tracking year; skipping reset"
        );
        return outcome;
    }

    reset_elapsed_periods(ledger, today, &mut outcome);

    if outcome.changed {
        info!(
            today = %today,
            archived = ?outcome.archived_years,
            unchecked = outcome.unchecked,
            "redemption reset applied"
        );
    }

    outcome
}

/// Oldest year encoded in any completed period id.
///
/// Only used for ledgers that carry no explicit tracking year (legacy
/// documents). Taking the oldest year means every older period still gets
/// archived by the rollover.
pub fn derive_tracking_year(ledger: &Ledger) -> Option<i32> {
    ledger
        .redemptions()
        .flat_map(|r| r.completed_periods_this_year.iter())
        .filter_map(|p| year_of(p))
        .min()
}

/// Record the period of every checked, dated redemption that lacks it.
///
/// Legacy documents only carry `checked` and `lastCheckedDate`; without this
/// their claims would count for nothing and never reach a yearly summary.
fn backfill_checked_periods(ledger: &mut Ledger) -> usize {
    let mut added = 0;
    for redemption in ledger.cards.iter_mut().flat_map(|c| c.redemptions.iter_mut()) {
        if !redemption.checked {
            continue;
        }
        if let Some(last) = redemption.last_checked_date {
            if redemption
                .completed_periods_this_year
                .insert(period_id(last, redemption.frequency))
            {
                added += 1;
            }
        }
    }
    added
}

/// True when `today` falls before the ledger's active tracking year.
pub fn is_before_tracking_year(ledger: &Ledger, today: NaiveDate) -> bool {
    ledger
        .active_tracking_year
        .map_or(false, |year| today.year() < year)
}

fn rollover(ledger: &mut Ledger, today: NaiveDate, outcome: &mut ResetOutcome) {
    let today_year = today.year();

    for card in ledger.cards.iter_mut() {
        for year in archive_year_totals(card, today_year) {
            info!(
                card_id = %card.id,
                year,
                total = card.yearly_reimbursement_summaries.get(&year).copied().unwrap_or_default(),
                "archived yearly reimbursement total"
            );
            if !outcome.archived_years.contains(&year) {
                outcome.archived_years.push(year);
            }
        }

        for redemption in card.redemptions.iter_mut() {
            // Periods already claimed in the new year are kept; everything
            // older has just been archived.
            redemption
                .completed_periods_this_year
                .retain(|p| year_of(p) == Some(today_year));

            let checked_this_year = redemption
                .last_checked_date
                .map_or(false, |d| d.year() == today_year);
            if !checked_this_year {
                if redemption.checked {
                    outcome.unchecked += 1;
                }
                redemption.checked = false;
                redemption.last_checked_date = None;
            }
        }
    }

    outcome.archived_years.sort_unstable();
    ledger.active_tracking_year = Some(today_year);
    outcome.changed = true;
}

fn reset_elapsed_periods(ledger: &mut Ledger, today: NaiveDate, outcome: &mut ResetOutcome) {
    for card in ledger.cards.iter_mut() {
        for redemption in card.redemptions.iter_mut().filter(|r| r.checked) {
            match redemption.last_checked_date {
                Some(last) if last.year() == today.year() => {
                    if is_later_period(today, last, redemption.frequency) {
                        debug!(
                            redemption_id = %redemption.id,
                            last_checked = %last,
                            "period elapsed; unchecking"
                        );
                        redemption.checked = false;
                        redemption.last_checked_date = None;
                        outcome.unchecked += 1;
                        outcome.changed = true;
                    }
                }
                Some(last) => {
                    warn!(
                        redemption_id = %redemption.id,
                        last_checked = %last,
                        "stale check from another year; clearing"
                    );
                    redemption.checked = false;
                    redemption.last_checked_date = None;
                    redemption.completed_periods_this_year.clear();
                    outcome.unchecked += 1;
                    outcome.changed = true;
                }
                None => {
                    warn!(redemption_id = %redemption.id, "checked without a date; unchecking");
                    redemption.checked = false;
                    outcome.unchecked += 1;
                    outcome.changed = true;
                }
            }
        }
    }
}

// ============================================================================
// CHECK / UNCHECK
// ============================================================================

/// Mark a redemption as claimed (or unclaimed) for today's period.
///
/// Checking inserts today's period id; a second check in the same period
/// is a no-op on the set. Unchecking removes today's period id if present.
pub fn set_checked(redemption: &mut Redemption, checked: bool, today: NaiveDate) -> &Redemption {
    let period = period_id(today, redemption.frequency);

    if checked {
        redemption.last_checked_date = Some(today);
        redemption.completed_periods_this_year.insert(period);
    } else {
        redemption.last_checked_date = None;
        redemption.completed_periods_this_year.remove(&period);
    }
    redemption.checked = checked;

    redemption
}
