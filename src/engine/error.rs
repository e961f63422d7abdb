use thiserror::Error;
use ulid::Ulid;

use crate::listings::DirectoryError;
use crate::model::BookingStatus;

/// Broad classification callers use to map errors onto their own surface
/// (HTTP status, retry policy). Only `Unavailable` is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidRequest,
    Forbidden,
    Unavailable,
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("listing not found or not bookable: {0}")]
    ListingNotFound(Ulid),
    #[error("booking not found: {0}")]
    BookingNotFound(Ulid),
    #[error("cannot book your own listing")]
    OwnListing,
    #[error("end date must be after start date")]
    DatesReversed,
    #[error("start date cannot be in the past")]
    StartInPast,
    /// Covers both a pre-existing conflict and losing the create race —
    /// callers cannot tell them apart, and the remedy is the same.
    #[error("these dates are not available")]
    DatesUnavailable,
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("only the host can confirm or reject a booking")]
    HostOnly,
    #[error("only the renter or host can cancel a booking")]
    PartyOnly,
    #[error("completion is applied by the platform, not by users")]
    ServiceOnly,
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        use BookingError::*;
        match self {
            ListingNotFound(_) | BookingNotFound(_) => ErrorKind::NotFound,
            HostOnly | PartyOnly | ServiceOnly => ErrorKind::Forbidden,
            Unavailable(_) => ErrorKind::Unavailable,
            OwnListing | DatesReversed | StartInPast | DatesUnavailable
            | InvalidTransition { .. } | LimitExceeded(_) => ErrorKind::InvalidRequest,
        }
    }
}

impl From<DirectoryError> for BookingError {
    fn from(e: DirectoryError) -> Self {
        BookingError::Unavailable(e.to_string())
    }
}
