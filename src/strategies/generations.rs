use chrono::{Datelike, Days, NaiveDate, Weekday};

use super::{RetentionStrategy, StrategyBase};

/// Grandfather-father-son rotation: daily buckets live a week, Monday buckets
/// live four weeks, and the first Monday of a month is kept for good.
///
/// On a Monday the bucket from 28 days ago is removed unless it was the first
/// Monday of its month (the Monday a week before it fell in another month).
pub fn generations_expired(today: NaiveDate) -> Option<NaiveDate> {
    if today.weekday() != Weekday::Mon {
        return today.checked_sub_days(Days::new(7));
    }

    let candidate = today.checked_sub_days(Days::new(28))?;
    let previous = candidate.checked_sub_days(Days::new(7))?;
    (candidate.month() == previous.month()).then_some(candidate)
}

pub struct GenerationsStrategy {
    base: StrategyBase,
}

impl GenerationsStrategy {
    pub fn new(base: StrategyBase) -> Self {
        Self { base }
    }
}

impl RetentionStrategy for GenerationsStrategy {
    fn base(&self) -> &StrategyBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StrategyBase {
        &mut self.base
    }

    fn expired(&self) -> Option<NaiveDate> {
        generations_expired(self.base.date())
    }
}
