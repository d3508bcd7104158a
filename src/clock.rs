// Clock - where "today" comes from
//
// The repository never calls `Local::now()` directly so tests can pin the
// date and walk it across period and year boundaries.

use chrono::{Local, NaiveDate};
use std::sync::{Arc, PoisonError, RwLock};

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date of the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Settable clock. Clones share the same date.
#[derive(Debug, Clone)]
pub struct FixedClock {
    date: Arc<RwLock<NaiveDate>>,
}

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        FixedClock {
            date: Arc::new(RwLock::new(date)),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        *self.date.write().unwrap_or_else(PoisonError::into_inner) = date;
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.date.read().unwrap_or_else(PoisonError::into_inner)
    }
}
