use chrono::{Days, NaiveDate};

use super::{RetentionStrategy, StrategyBase};
use crate::config::StrategyConfig;

/// Bucket that is exactly `revisions` days old. Zero revisions keeps everything.
pub fn days_expired(today: NaiveDate, revisions: u32) -> Option<NaiveDate> {
    if revisions == 0 {
        return None;
    }
    today.checked_sub_days(Days::new(u64::from(revisions)))
}

/// Keeps one bucket per day for the last `revisions` days
pub struct DaysStrategy {
    base: StrategyBase,
    revisions: u32,
}

impl DaysStrategy {
    pub fn new(config: &StrategyConfig, base: StrategyBase) -> Self {
        Self {
            base,
            revisions: config.revisions(),
        }
    }

    pub fn revisions(&self) -> u32 {
        self.revisions
    }
}

impl RetentionStrategy for DaysStrategy {
    fn base(&self) -> &StrategyBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StrategyBase {
        &mut self.base
    }

    fn expired(&self) -> Option<NaiveDate> {
        days_expired(self.base.date(), self.revisions)
    }
}
