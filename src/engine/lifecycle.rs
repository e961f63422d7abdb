use crate::model::{Actor, Booking, BookingStatus};

use super::BookingError;

/// A requested state change, derived from the caller's target status.
/// Closed set — there is no transition back into `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Confirm,
    Reject,
    Cancel,
    Complete,
}

impl Transition {
    /// Map a caller-supplied target status onto a transition.
    pub fn toward(target: BookingStatus) -> Option<Transition> {
        match target {
            BookingStatus::Confirmed => Some(Transition::Confirm),
            BookingStatus::Rejected => Some(Transition::Reject),
            BookingStatus::Cancelled => Some(Transition::Cancel),
            BookingStatus::Completed => Some(Transition::Complete),
            BookingStatus::Pending => None,
        }
    }

    pub fn target(self) -> BookingStatus {
        match self {
            Transition::Confirm => BookingStatus::Confirmed,
            Transition::Reject => BookingStatus::Rejected,
            Transition::Cancel => BookingStatus::Cancelled,
            Transition::Complete => BookingStatus::Completed,
        }
    }
}

/// Authorization table: who may request each transition.
///
/// Confirm/reject belong to the host, cancel to either party, and
/// completion to the platform collaborator alone — user identity never
/// grants it.
pub fn authorize(
    booking: &Booking,
    transition: Transition,
    actor: Actor,
) -> Result<(), BookingError> {
    match transition {
        Transition::Confirm | Transition::Reject => match actor {
            Actor::User(id) if id == booking.host_id => Ok(()),
            _ => Err(BookingError::HostOnly),
        },
        Transition::Cancel => match actor {
            Actor::User(id) if id == booking.renter_id || id == booking.host_id => Ok(()),
            _ => Err(BookingError::PartyOnly),
        },
        Transition::Complete => match actor {
            Actor::Service => Ok(()),
            Actor::User(_) => Err(BookingError::ServiceOnly),
        },
    }
}

/// Legality table: which transitions each status admits. Terminal states
/// (`cancelled`, `completed`, `rejected`) admit none.
pub fn next_status(
    current: BookingStatus,
    transition: Transition,
) -> Result<BookingStatus, BookingError> {
    use BookingStatus::*;
    use Transition::*;

    match (current, transition) {
        (Pending, Confirm) => Ok(Confirmed),
        (Pending, Reject) => Ok(Rejected),
        (Pending, Cancel) | (Confirmed, Cancel) => Ok(Cancelled),
        (Confirmed, Complete) => Ok(Completed),
        (from, t) => Err(BookingError::InvalidTransition {
            from,
            to: t.target(),
        }),
    }
}
