//! Facility-local time policy.
//!
//! Scan timestamps are taken in the facility's fixed UTC offset rather than
//! the scanning device's local time, so every child in one scan batch shares
//! an identical nominal time. The offset comes from configuration; callers
//! obtain `now` once per request and pass it down, which keeps tests
//! deterministic.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

#[derive(Debug, Clone, Copy)]
pub struct FacilityClock {
    offset: FixedOffset,
}

impl FacilityClock {
    pub fn from_offset_hours(hours: i8) -> Option<Self> {
        FixedOffset::east_opt(i32::from(hours) * 3600).map(|offset| Self { offset })
    }

    pub fn to_local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset)
    }

    /// Facility-local calendar date for a given instant.
    pub fn today(&self, at: DateTime<Utc>) -> NaiveDate {
        self.to_local(at).date_naive()
    }

    /// 12-hour wall-clock rendering used in guardian-facing messages,
    /// e.g. "09:00 AM".
    pub fn format_time(&self, at: DateTime<Utc>) -> String {
        self.to_local(at).format("%I:%M %p").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn offset_shifts_calendar_date() {
        let clock = FacilityClock::from_offset_hours(3).unwrap();
        // 22:30 UTC is already the next day at UTC+3.
        let at = Utc.with_ymd_and_hms(2024, 9, 30, 22, 30, 0).unwrap();
        assert_eq!(
            clock.today(at),
            NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()
        );
    }

    #[test]
    fn formats_twelve_hour_time() {
        let clock = FacilityClock::from_offset_hours(3).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 10, 1, 6, 0, 0).unwrap();
        assert_eq!(clock.format_time(at), "09:00 AM");

        let at = Utc.with_ymd_and_hms(2024, 10, 1, 12, 5, 0).unwrap();
        assert_eq!(clock.format_time(at), "03:05 PM");
    }

    #[test]
    fn rejects_out_of_range_offset() {
        assert!(FacilityClock::from_offset_hours(24).is_none());
    }
}
