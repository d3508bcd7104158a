// Period Calendar - date + frequency -> period identifier
//
// Identifiers encode the year and the sub-year bucket:
//   MONTHLY   2025-M03
//   QUARTERLY 2025-Q1
//   BIANNUAL  2025-H2
//   YEARLY    2025-Y

use chrono::{Datelike, NaiveDate};

use crate::models::Frequency;

/// Identifier of the period containing `date`.
pub fn period_id(date: NaiveDate, frequency: Frequency) -> String {
    let bucket = frequency.bucket(date.month());
    match frequency {
        Frequency::Monthly => format!("{:04}-{}{:02}", date.year(), frequency.tag(), bucket),
        Frequency::Quarterly | Frequency::Biannual => {
            format!("{:04}-{}{}", date.year(), frequency.tag(), bucket)
        }
        Frequency::Yearly => format!("{:04}-{}", date.year(), frequency.tag()),
    }
}

/// Year encoded in the first four characters of a period id.
///
/// Returns `None` for malformed ids; callers skip them.
pub fn year_of(period_id: &str) -> Option<i32> {
    let year = period_id.get(..4)?;
    if !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    year.parse().ok()
}

/// True when `today` falls in a strictly later period than `last` within the
/// same calendar year.
///
/// Different years are never compared here: crossing a year is the job of
/// the rollover. Yearly redemptions have a single bucket, so this is always
/// false for them.
pub fn is_later_period(today: NaiveDate, last: NaiveDate, frequency: Frequency) -> bool {
    if today.year() != last.year() {
        return false;
    }
    frequency.bucket(today.month()) > frequency.bucket(last.month())
}
