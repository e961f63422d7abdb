use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::model::{Booking, Period};

use super::{BookingEngine, BookingError, availability};

impl BookingEngine {
    /// Booked date ranges for a listing's public calendar: every
    /// non-cancelled booking that has not yet ended, ascending by start.
    /// Read-only; a listing with no bookings yields an empty list.
    pub async fn get_booked_dates(&self, listing_id: Ulid) -> Vec<Period> {
        let Some(cal) = self.calendar(&listing_id) else {
            return Vec::new();
        };
        let guard = cal.read().await;
        availability::booked_ranges(&guard, Utc::now())
    }

    /// Availability probe for the service layer. `exclude` omits one
    /// booking, for re-validating its own dates. An empty or reversed
    /// range conflicts with nothing.
    pub async fn has_conflict(
        &self,
        listing_id: Ulid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Ulid>,
    ) -> bool {
        if start >= end {
            return false;
        }
        let Some(cal) = self.calendar(&listing_id) else {
            return false;
        };
        let guard = cal.read().await;
        availability::has_conflict(&guard, &Period::new(start, end), exclude)
    }

    pub async fn find_booking(&self, id: Ulid) -> Result<Booking, BookingError> {
        let listing_id = self
            .listing_for_booking(&id)
            .ok_or(BookingError::BookingNotFound(id))?;
        let cal = self
            .calendar(&listing_id)
            .ok_or(BookingError::BookingNotFound(id))?;
        let guard = cal.read().await;
        guard
            .booking(&id)
            .cloned()
            .ok_or(BookingError::BookingNotFound(id))
    }

    /// A renter's bookings, newest first.
    pub async fn bookings_for_renter(&self, renter_id: Ulid) -> Vec<Booking> {
        let ids = self
            .by_renter
            .get(&renter_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        self.collect_newest_first(ids).await
    }

    /// Bookings across all of a host's listings, newest first.
    pub async fn bookings_for_host(&self, host_id: Ulid) -> Vec<Booking> {
        let ids = self
            .by_host
            .get(&host_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        self.collect_newest_first(ids).await
    }

    /// Ids arrive in creation order; walking them backwards gives
    /// created_at descending without a sort.
    async fn collect_newest_first(&self, ids: Vec<Ulid>) -> Vec<Booking> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids.into_iter().rev() {
            if let Some(listing_id) = self.listing_for_booking(&id)
                && let Some(cal) = self.calendar(&listing_id) {
                    let guard = cal.read().await;
                    if let Some(b) = guard.booking(&id) {
                        out.push(b.clone());
                    }
                }
        }
        out
    }
}
