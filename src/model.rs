use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Half-open stay interval `[start, end)`.
///
/// `start` is inclusive, `end` exclusive, so back-to-back stays sharing a
/// boundary do not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start < end, "Period start must be before end");
        Self { start, end }
    }

    pub fn overlaps(&self, other: &Period) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whole days covered by the stay, any partial day rounded up.
    /// Never less than 1.
    pub fn duration_days(&self) -> i64 {
        let secs = (self.end - self.start).num_seconds();
        ((secs + 86_399) / 86_400).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    Rejected,
}

impl BookingStatus {
    /// Only pending and confirmed bookings occupy the calendar.
    pub fn blocks_calendar(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Cancelled | BookingStatus::Completed | BookingStatus::Rejected
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Draft,
    Active,
    Paused,
    Archived,
}

/// Read-only listing snapshot fetched from the directory collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Ulid,
    pub host_id: Ulid,
    /// Flat per-day rate in the listing's currency.
    pub base_price: Decimal,
    pub currency: String,
    /// Auto-confirm bookings without host approval.
    pub instant_book: bool,
    pub status: ListingStatus,
}

impl Listing {
    pub fn is_bookable(&self) -> bool {
        self.status == ListingStatus::Active
    }
}

/// Who is asking for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// An authenticated marketplace user (renter or host, decided per booking).
    User(Ulid),
    /// The platform itself. The only actor allowed to mark stays completed.
    Service,
}

/// Priced stay: `total_amount == subtotal + service_fee`, currency copied
/// from the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub subtotal: Decimal,
    pub service_fee: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
}

/// Set once, on the transition into `cancelled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: Ulid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub listing_id: Ulid,
    pub renter_id: Ulid,
    /// Denormalized from the listing at creation time, never re-derived.
    pub host_id: Ulid,
    pub period: Period,
    pub quote: Quote,
    pub status: BookingStatus,
    /// Opaque handle into the payment collaborator. Never interpreted here.
    pub payment_intent_id: Option<String>,
    pub cancellation: Option<Cancellation>,
    /// Renter's message to the host.
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-listing calendar — every booking ever taken for the listing,
/// sorted by `period.start`. Records are never removed; freed dates are
/// expressed through status alone.
#[derive(Debug, Clone)]
pub struct ListingCalendar {
    pub listing_id: Ulid,
    pub bookings: Vec<Booking>,
}

impl ListingCalendar {
    pub fn new(listing_id: Ulid) -> Self {
        Self {
            listing_id,
            bookings: Vec::new(),
        }
    }

    /// Insert a booking maintaining sort order by period start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.period.start, |b| b.period.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn booking(&self, id: &Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == *id)
    }

    pub fn booking_mut(&mut self, id: &Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == *id)
    }

    /// Bookings whose period overlaps the query window, regardless of status.
    /// Binary search skips everything starting at or after `query.end`.
    pub fn overlapping(&self, query: &Period) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.period.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.period.end > query.start)
    }
}

/// The journal record format — flat, one entry per committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Carries the full booking so a journal snapshot is just the list of
    /// live bookings in their current state.
    BookingCreated { booking: Booking },
    StatusChanged {
        id: Ulid,
        listing_id: Ulid,
        status: BookingStatus,
        cancellation: Option<Cancellation>,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Listing whose calendar this event belongs to.
    pub fn listing_id(&self) -> Ulid {
        match self {
            Event::BookingCreated { booking } => booking.listing_id,
            Event::StatusChanged { listing_id, .. } => *listing_id,
        }
    }
}
