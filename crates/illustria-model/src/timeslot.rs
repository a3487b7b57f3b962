// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

pub const MONTHS_PER_YEAR: i64 = 12;
pub const DAYS_PER_MONTH: i64 = 30;
pub const SLOTS_PER_DAY: i64 = 3;
pub const SLOTS_PER_YEAR: i64 = MONTHS_PER_YEAR * DAYS_PER_MONTH * SLOTS_PER_DAY;

/// A position in the Illustria calendar: 12 months of 30 days, 3
/// time-of-day buckets per day. The calendar is normalized, with no
/// leap days and no variable month lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub month: i64,
    pub day: i64,
    pub tod: i64,
}

impl TimeSlot {
    #[must_use]
    pub const fn new(month: i64, day: i64, tod: i64) -> Self {
        Self { month, day, tod }
    }

    /// Dense index of this slot within a year:
    /// `((month-1)*30 + (day-1))*3 + tod`.
    ///
    /// The mapping is injective and strictly increasing in (month, day,
    /// tod) over the nominal domain month∈[1,12], day∈[1,30], tod∈[0,2].
    /// Out-of-domain values are accepted and fed through the raw formula
    /// unchanged; a range scan anchored at such a slot simply matches
    /// whatever stored indices fall in its window, usually none.
    #[must_use]
    pub const fn slot_index(self) -> i64 {
        ((self.month - 1) * DAYS_PER_MONTH + (self.day - 1)) * SLOTS_PER_DAY + self.tod
    }
}
