use chrono::{NaiveDate, NaiveDateTime};

/// Source of "now" for windowed statistics and error timestamps.
///
/// The batch tables store zone-less local timestamps, so the clock speaks
/// `NaiveDateTime` in the same local frame.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Clock pinned to a single instant (tests, replaying a report "as of" a date).
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
