// Domain Model - Cards, Redemptions, Ledger
//
// A Card owns an ordered list of Redemptions (recurring reimbursable
// benefits). The Ledger is the persisted document: every card plus the
// year the completed-period sets currently describe.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// FREQUENCY
// ============================================================================

/// How often a redemption can be claimed.
///
/// Closed set: `bucket` and `tag` are the only places that dispatch on it,
/// so adding a variant forces both the period ids and the reset ordering to
/// be updated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Monthly,
    Quarterly,
    Biannual,
    Yearly,
}

impl Frequency {
    pub const ALL: [Frequency; 4] = [
        Frequency::Monthly,
        Frequency::Quarterly,
        Frequency::Biannual,
        Frequency::Yearly,
    ];

    /// Index of the sub-year bucket containing `month` (1-12).
    ///
    /// Monthly: 1..=12, Quarterly: 1..=4, Biannual: 1..=2, Yearly: always 1.
    pub fn bucket(&self, month: u32) -> u32 {
        match self {
            Frequency::Monthly => month,
            Frequency::Quarterly => (month + 2) / 3,
            Frequency::Biannual => {
                if month <= 6 {
                    1
                } else {
                    2
                }
            }
            Frequency::Yearly => 1,
        }
    }

    /// Letter used in period identifiers.
    pub fn tag(&self) -> char {
        match self {
            Frequency::Monthly => 'M',
            Frequency::Quarterly => 'Q',
            Frequency::Biannual => 'H',
            Frequency::Yearly => 'Y',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Monthly => "MONTHLY",
            Frequency::Quarterly => "QUARTERLY",
            Frequency::Biannual => "BIANNUAL",
            Frequency::Yearly => "YEARLY",
        }
    }
}

// ============================================================================
// REDEMPTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    pub id: String,
    pub name: String,
    /// Reimbursement value per claimed period
    pub amount: f64,
    pub frequency: Frequency,
    #[serde(default)]
    pub checked: bool,
    #[serde(default, deserialize_with = "lenient_date")]
    pub last_checked_date: Option<NaiveDate>,
    /// Period ids claimed during the active tracking year
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed_periods_this_year: BTreeSet<String>,
}

impl Redemption {
    /// Create an unchecked redemption with a fresh UUID and no claimed periods
    pub fn new(name: String, amount: f64, frequency: Frequency) -> Self {
        Redemption {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            amount,
            frequency,
            checked: false,
            last_checked_date: None,
            completed_periods_this_year: BTreeSet::new(),
        }
    }

    /// Number of periods claimed in the active tracking year
    pub fn completed_count(&self) -> usize {
        self.completed_periods_this_year.len()
    }
}

// ============================================================================
// CARD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub redemptions: Vec<Redemption>,
    /// Archived totals, keyed by calendar year
    #[serde(default, deserialize_with = "null_as_default")]
    pub yearly_reimbursement_summaries: BTreeMap<i32, f64>,
    /// Recomputed on every read; never trusted when loaded
    #[serde(default)]
    pub current_year_total: f64,
}

impl Card {
    pub fn new(name: String, description: String) -> Self {
        Card {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            description,
            redemptions: Vec::new(),
            yearly_reimbursement_summaries: BTreeMap::new(),
            current_year_total: 0.0,
        }
    }

    pub fn find_redemption(&self, id: &str) -> Option<&Redemption> {
        self.redemptions.iter().find(|r| r.id == id)
    }

    pub fn find_redemption_mut(&mut self, id: &str) -> Option<&mut Redemption> {
        self.redemptions.iter_mut().find(|r| r.id == id)
    }
}

// ============================================================================
// LEDGER (persisted document)
// ============================================================================

/// Everything the store persists.
///
/// `active_tracking_year` is `None` for a fresh ledger or one loaded from
/// the legacy bare-array document; the first reset fills it in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    #[serde(default)]
    pub active_tracking_year: Option<i32>,
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl Ledger {
    pub fn new(cards: Vec<Card>) -> Self {
        Ledger {
            active_tracking_year: None,
            cards,
        }
    }

    pub fn find_card(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn find_card_mut(&mut self, id: &str) -> Option<&mut Card> {
        self.cards.iter_mut().find(|c| c.id == id)
    }

    /// Iterate every redemption across every card
    pub fn redemptions(&self) -> impl Iterator<Item = &Redemption> {
        self.cards.iter().flat_map(|c| c.redemptions.iter())
    }
}

// ============================================================================
// INPUT SHAPES (request bodies)
// ============================================================================

/// Body for creating or replacing a card.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCard {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub redemptions: Vec<NewRedemption>,
}

/// Body for adding a redemption.
///
/// `id` only matters on card updates: it names an existing redemption whose
/// tracking state should be kept. Tracking fields sent by clients are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRedemption {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub amount: f64,
    pub frequency: Frequency,
}

impl NewRedemption {
    pub fn into_redemption(self) -> Redemption {
        Redemption::new(self.name, self.amount, self.frequency)
    }
}

// ============================================================================
// LENIENT FIELDS
// ============================================================================
//
// Legacy data files carry `null` for unset strings and collections, and may
// store dates as `[2024, 12, 3]` arrays.

/// `null` reads as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DateRepr {
    Iso(NaiveDate),
    Parts(i32, u32, u32),
}

/// ISO `YYYY-MM-DD`, a `[year, month, day]` array, or `null`.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<DateRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(DateRepr::Iso(date)) => Ok(Some(date)),
        Some(DateRepr::Parts(y, m, d)) => NaiveDate::from_ymd_opt(y, m, d)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date {}-{}-{}", y, m, d))),
    }
}
