//! Temporal validation of scanned QR codes.
//!
//! A code is the deterministic string `"{facility_id}-{YYYY-MM-DD}"` printed
//! by the facility. Validation only checks the facility prefix and the date
//! window; it performs no entity lookups and has no side effects.

use crate::config::QrIssuance;
use chrono::{Datelike, NaiveDate};
use thiserror::Error;

/// Why a scanned code was refused. The message text is surfaced verbatim to
/// the scanning guardian.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum QrRejection {
    #[error("QR code does not belong to this facility.")]
    WrongFacility,
    #[error("QR code has expired. Please scan today's code.")]
    Expired,
}

/// Accept a code iff it names this facility and its embedded date falls in
/// the current validity window: the exact day for daily issuance, the same
/// ISO week for weekly issuance. Future-dated codes are refused the same way
/// as stale ones.
pub fn validate(
    code: &str,
    facility_id: &str,
    policy: QrIssuance,
    today: NaiveDate,
) -> Result<(), QrRejection> {
    let token = code
        .strip_prefix(facility_id)
        .and_then(|rest| rest.strip_prefix('-'))
        .ok_or(QrRejection::WrongFacility)?;

    let coded = NaiveDate::parse_from_str(token, "%Y-%m-%d").map_err(|_| QrRejection::Expired)?;

    let in_window = match policy {
        QrIssuance::Daily => coded == today,
        QrIssuance::Weekly => coded.iso_week() == today.iso_week(),
    };
    if in_window {
        Ok(())
    } else {
        Err(QrRejection::Expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn accepts_todays_daily_code() {
        let today = day(2024, 10, 1);
        assert_eq!(
            validate("sunrise-2024-10-01", "sunrise", QrIssuance::Daily, today),
            Ok(())
        );
    }

    #[test]
    fn rejects_prior_day_code() {
        let today = day(2024, 10, 1);
        assert_eq!(
            validate("sunrise-2024-09-30", "sunrise", QrIssuance::Daily, today),
            Err(QrRejection::Expired)
        );
    }

    #[test]
    fn rejects_future_code() {
        let today = day(2024, 10, 1);
        assert_eq!(
            validate("sunrise-2024-10-02", "sunrise", QrIssuance::Daily, today),
            Err(QrRejection::Expired)
        );
    }

    #[test]
    fn rejects_foreign_facility() {
        let today = day(2024, 10, 1);
        assert_eq!(
            validate("meadow-2024-10-01", "sunrise", QrIssuance::Daily, today),
            Err(QrRejection::WrongFacility)
        );
    }

    #[test]
    fn rejects_garbled_date_token() {
        let today = day(2024, 10, 1);
        assert_eq!(
            validate("sunrise-nonsense", "sunrise", QrIssuance::Daily, today),
            Err(QrRejection::Expired)
        );
    }

    #[test]
    fn weekly_accepts_adjacent_day_in_same_week() {
        // 2024-10-01 is a Tuesday; Monday's code is still in the same ISO week.
        let today = day(2024, 10, 1);
        assert_eq!(
            validate("sunrise-2024-09-30", "sunrise", QrIssuance::Weekly, today),
            Ok(())
        );
    }

    #[test]
    fn weekly_rejects_previous_week() {
        let today = day(2024, 10, 1);
        assert_eq!(
            validate("sunrise-2024-09-29", "sunrise", QrIssuance::Weekly, today),
            Err(QrRejection::Expired)
        );
    }
}
