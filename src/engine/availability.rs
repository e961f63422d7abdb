use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::model::{BookingStatus, ListingCalendar, Period};

// ── Availability Checker ──────────────────────────────────────────

/// True when `period` overlaps a booking that occupies the calendar
/// (status pending or confirmed). Cancelled, rejected, and completed
/// bookings never block new reservations.
///
/// `exclude`, when set, omits that booking — used to re-validate a
/// booking's own dates without it conflicting with itself.
///
/// Callers needing the check to hold through a subsequent insert must run
/// both under the listing's write lock; the engine's create path does.
pub fn has_conflict(calendar: &ListingCalendar, period: &Period, exclude: Option<Ulid>) -> bool {
    calendar
        .overlapping(period)
        .filter(|b| b.status.blocks_calendar())
        .any(|b| exclude.is_none_or(|e| e != b.id))
}

/// Booked ranges for the public calendar feed: every non-cancelled booking
/// that has not yet ended, ascending by start date.
///
/// Deliberately wider than the conflict rule — rejected and completed
/// stays still show until their end date passes, matching what renters see
/// in the calendar UI upstream.
pub fn booked_ranges(calendar: &ListingCalendar, now: DateTime<Utc>) -> Vec<Period> {
    calendar
        .bookings
        .iter()
        .filter(|b| b.status != BookingStatus::Cancelled && b.period.end >= now)
        .map(|b| b.period)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Booking, Quote};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 8, d, 0, 0, 0).unwrap()
    }

    fn stay(from: u32, to: u32, status: BookingStatus) -> Booking {
        let created = day(1);
        Booking {
            id: Ulid::new(),
            listing_id: Ulid::new(),
            renter_id: Ulid::new(),
            host_id: Ulid::new(),
            period: Period::new(day(from), day(to)),
            quote: Quote {
                subtotal: dec!(100.00),
                service_fee: dec!(10.00),
                total_amount: dec!(110.00),
                currency: "USD".into(),
            },
            status,
            payment_intent_id: None,
            cancellation: None,
            message: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn calendar(bookings: Vec<Booking>) -> ListingCalendar {
        let mut cal = ListingCalendar::new(Ulid::new());
        for b in bookings {
            cal.insert_booking(b);
        }
        cal
    }

    // ── has_conflict ──────────────────────────────────────

    #[test]
    fn overlap_with_pending_conflicts() {
        let cal = calendar(vec![stay(5, 10, BookingStatus::Pending)]);
        assert!(has_conflict(&cal, &Period::new(day(8), day(12)), None));
    }

    #[test]
    fn overlap_with_confirmed_conflicts() {
        let cal = calendar(vec![stay(5, 10, BookingStatus::Confirmed)]);
        assert!(has_conflict(&cal, &Period::new(day(1), day(6)), None));
    }

    #[test]
    fn containment_conflicts_both_ways() {
        let cal = calendar(vec![stay(5, 10, BookingStatus::Confirmed)]);
        // query inside the stay
        assert!(has_conflict(&cal, &Period::new(day(6), day(8)), None));
        // query swallowing the stay
        assert!(has_conflict(&cal, &Period::new(day(1), day(15)), None));
    }

    #[test]
    fn touching_endpoints_do_not_conflict() {
        let cal = calendar(vec![stay(5, 10, BookingStatus::Confirmed)]);
        assert!(!has_conflict(&cal, &Period::new(day(10), day(14)), None));
        assert!(!has_conflict(&cal, &Period::new(day(2), day(5)), None));
    }

    #[test]
    fn settled_statuses_never_block() {
        for status in [
            BookingStatus::Cancelled,
            BookingStatus::Rejected,
            BookingStatus::Completed,
        ] {
            let cal = calendar(vec![stay(5, 10, status)]);
            assert!(
                !has_conflict(&cal, &Period::new(day(6), day(9)), None),
                "{status} should not occupy the calendar"
            );
        }
    }

    #[test]
    fn exclusion_skips_own_booking() {
        let b = stay(5, 10, BookingStatus::Confirmed);
        let id = b.id;
        let cal = calendar(vec![b]);
        assert!(!has_conflict(&cal, &Period::new(day(5), day(10)), Some(id)));
        // a different id still conflicts
        assert!(has_conflict(
            &cal,
            &Period::new(day(5), day(10)),
            Some(Ulid::new())
        ));
    }

    #[test]
    fn empty_calendar_never_conflicts() {
        let cal = calendar(vec![]);
        assert!(!has_conflict(&cal, &Period::new(day(1), day(30)), None));
    }

    #[test]
    fn conflict_found_among_many() {
        let mut bookings: Vec<Booking> = (1..10)
            .map(|i| stay(i * 3, i * 3 + 2, BookingStatus::Confirmed))
            .collect();
        bookings.push(stay(28, 30, BookingStatus::Cancelled));
        let cal = calendar(bookings);
        // gap [8,9) between [6,8) and [9,11)
        assert!(!has_conflict(&cal, &Period::new(day(8), day(9)), None));
        assert!(has_conflict(&cal, &Period::new(day(8), day(10)), None));
        // cancelled tail leaves [28,30) free
        assert!(!has_conflict(&cal, &Period::new(day(28), day(30)), None));
    }

    // ── booked_ranges ─────────────────────────────────────

    #[test]
    fn ranges_sorted_ascending() {
        let cal = calendar(vec![
            stay(20, 22, BookingStatus::Confirmed),
            stay(3, 6, BookingStatus::Pending),
            stay(10, 12, BookingStatus::Confirmed),
        ]);
        let ranges = booked_ranges(&cal, day(1));
        assert_eq!(
            ranges,
            vec![
                Period::new(day(3), day(6)),
                Period::new(day(10), day(12)),
                Period::new(day(20), day(22)),
            ]
        );
    }

    #[test]
    fn cancelled_excluded_immediately() {
        let mut cancelled = stay(10, 12, BookingStatus::Confirmed);
        cancelled.status = BookingStatus::Cancelled;
        let cal = calendar(vec![stay(3, 6, BookingStatus::Pending), cancelled]);
        assert_eq!(booked_ranges(&cal, day(1)), vec![Period::new(day(3), day(6))]);
    }

    #[test]
    fn ended_stays_excluded() {
        let cal = calendar(vec![
            stay(3, 6, BookingStatus::Completed),
            stay(10, 12, BookingStatus::Confirmed),
        ]);
        let ranges = booked_ranges(&cal, day(8));
        assert_eq!(ranges, vec![Period::new(day(10), day(12))]);
    }

    #[test]
    fn rejected_still_listed_until_ended() {
        // The feed excludes only cancelled bookings; a rejected stay with a
        // future end date remains visible even though it does not block.
        let cal = calendar(vec![stay(10, 12, BookingStatus::Rejected)]);
        assert_eq!(
            booked_ranges(&cal, day(1)),
            vec![Period::new(day(10), day(12))]
        );
        assert!(!has_conflict(&cal, &Period::new(day(10), day(12)), None));
    }
}
