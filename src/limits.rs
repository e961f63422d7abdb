//! Input limits enforced by the engine. Violations surface as
//! invalid-request errors, never as truncation.

/// Longest renter message stored on a booking.
pub const MAX_MESSAGE_LEN: usize = 2_000;

/// Longest cancellation reason stored on a booking.
pub const MAX_REASON_LEN: usize = 500;

/// Longest stay, in whole days.
pub const MAX_STAY_DAYS: i64 = 365;

/// Bookings retained per listing calendar. Records are never deleted, so
/// this caps the journal replay cost for a single listing.
pub const MAX_BOOKINGS_PER_LISTING: usize = 50_000;
