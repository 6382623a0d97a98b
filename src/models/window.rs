//! Half-open time intervals.
//!
//! Every interval in the engine is `[start, end)`: a schedule ending exactly
//! when another begins does not overlap it. The calendar-day helpers feed the
//! daily driving-time accounting, which clips each schedule to the UTC day
//! being summed.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// A half-open UTC time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Construct a window, refusing an empty or inverted interval.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// `start < end`.
    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    /// Length of the interval.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether an instant lies inside this interval (inclusive start,
    /// exclusive end).
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }

    /// Whether this interval overlaps another under half-open semantics.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The intersection with `bounds`, or `None` when the intervals are
    /// disjoint.
    pub fn clip_to(&self, bounds: &Self) -> Option<Self> {
        let start = self.start.max(bounds.start);
        let end = self.end.min(bounds.end);
        TimeWindow::new(start, end)
    }

    /// Translate both endpoints by `offset` (which may be negative).
    pub fn shifted_by(&self, offset: Duration) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
        }
    }

    /// The UTC calendar days `[00:00, 00:00+1d)` this interval touches, in
    /// order. A window ending exactly at midnight does not touch the day it
    /// ends on.
    pub fn calendar_days(&self) -> Vec<TimeWindow> {
        let mut days = Vec::new();
        if !self.is_valid() {
            return days;
        }
        let mut day = self.start.date_naive();
        loop {
            let day_start = day.and_time(NaiveTime::MIN).and_utc();
            if day_start >= self.end {
                break;
            }
            let Some(next) = day.succ_opt() else { break };
            days.push(TimeWindow {
                start: day_start,
                end: next.and_time(NaiveTime::MIN).and_utc(),
            });
            day = next;
        }
        days
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
