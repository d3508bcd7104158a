// Summary Calculator - current-year and archived reimbursement totals

use std::collections::BTreeMap;
use tracing::warn;

use crate::models::Card;
use crate::period::year_of;

/// Year-to-date total for one card: `amount * claimed periods` per redemption.
///
/// Relies on the completed-period sets only holding ids of the active
/// tracking year.
pub fn current_year_total(card: &Card) -> f64 {
    card.redemptions
        .iter()
        .map(|r| r.amount * r.completed_count() as f64)
        .sum()
}

/// Year-to-date total across all cards
pub fn current_year_reimbursement_total(cards: &[Card]) -> f64 {
    cards.iter().map(current_year_total).sum()
}

/// Archived total for `year`, if one was recorded
pub fn yearly_summary(card: &Card, year: i32) -> Option<f64> {
    card.yearly_reimbursement_summaries.get(&year).copied()
}

/// Refresh the transient `current_year_total` on every card
pub fn refresh_current_year_totals(cards: &mut [Card]) {
    for card in cards.iter_mut() {
        card.current_year_total = current_year_total(card);
    }
}

/// Totals per encoded year for every completed period older than `before_year`.
///
/// Malformed ids are skipped. Each period contributes the redemption's
/// amount once, since the sets cannot hold duplicates.
pub fn totals_before(card: &Card, before_year: i32) -> BTreeMap<i32, f64> {
    let mut totals = BTreeMap::new();

    for redemption in &card.redemptions {
        for period in &redemption.completed_periods_this_year {
            match year_of(period) {
                Some(year) if year < before_year => {
                    *totals.entry(year).or_insert(0.0) += redemption.amount;
                }
                Some(_) => {}
                None => warn!(
                    card_id = %card.id,
                    redemption_id = %redemption.id,
                    period = %period,
                    "skipping malformed period id"
                ),
            }
        }
    }

    totals
}

/// Store the totals of every year before `before_year` into the card's
/// yearly summaries. Existing entries for those years are replaced, never
/// added to. Returns the years written.
pub fn archive_year_totals(card: &mut Card, before_year: i32) -> Vec<i32> {
    let totals = totals_before(card, before_year);
    let years: Vec<i32> = totals.keys().copied().collect();
    card.yearly_reimbursement_summaries.extend(totals);
    years
}
