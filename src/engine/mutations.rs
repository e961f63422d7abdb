use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tracing::debug;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::notify::BookingNotice;
use crate::observability;

use super::lifecycle::{self, Transition};
use super::{BookingEngine, BookingError, JournalCommand, availability, pricing};

/// Input for [`BookingEngine::create_booking`]. Dates are raw on purpose —
/// validating their order is the engine's job, not the caller's.
#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub listing_id: Ulid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Renter's message to the host.
    pub message: Option<String>,
    /// Opaque payment-intent handle, stored untouched.
    pub payment_intent_id: Option<String>,
}

impl BookingEngine {
    /// Reserve a date range on a listing for a renter.
    ///
    /// Preconditions, first failure wins: the listing exists and is active;
    /// the renter is not its host; `start < end`; `start` is not in the
    /// past; the range is free. The conflict check and the insert run under
    /// the listing's write lock, so of two racing creates for overlapping
    /// dates exactly one commits — the loser gets the same "dates
    /// unavailable" error a pre-existing conflict produces.
    ///
    /// The booking starts `confirmed` when the listing has instant-book
    /// enabled, `pending` otherwise.
    pub async fn create_booking(
        &self,
        renter_id: Ulid,
        req: CreateBooking,
    ) -> Result<Booking, BookingError> {
        let listing = self
            .listings
            .get(req.listing_id)
            .await?
            .filter(Listing::is_bookable)
            .ok_or(BookingError::ListingNotFound(req.listing_id))?;

        if listing.host_id == renter_id {
            return Err(BookingError::OwnListing);
        }
        if req.start >= req.end {
            return Err(BookingError::DatesReversed);
        }
        let now = Utc::now();
        if req.start < now {
            return Err(BookingError::StartInPast);
        }

        let period = Period::new(req.start, req.end);
        if period.duration_days() > MAX_STAY_DAYS {
            return Err(BookingError::LimitExceeded("stay too long"));
        }
        if let Some(ref m) = req.message
            && m.len() > MAX_MESSAGE_LEN {
                return Err(BookingError::LimitExceeded("message too long"));
            }

        let cal = self.calendar_or_default(req.listing_id);
        let mut guard = cal.write().await;
        if guard.bookings.len() >= MAX_BOOKINGS_PER_LISTING {
            return Err(BookingError::LimitExceeded("too many bookings on listing"));
        }
        if availability::has_conflict(&guard, &period, None) {
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(BookingError::DatesUnavailable);
        }

        let status = if listing.instant_book {
            BookingStatus::Confirmed
        } else {
            BookingStatus::Pending
        };
        let booking = Booking {
            id: Ulid::new(),
            listing_id: req.listing_id,
            renter_id,
            host_id: listing.host_id,
            period,
            quote: pricing::quote(&listing, &period),
            status,
            payment_intent_id: req.payment_intent_id,
            cancellation: None,
            message: req.message,
            created_at: now,
            updated_at: now,
        };

        let event = Event::BookingCreated {
            booking: booking.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        drop(guard);

        metrics::counter!(
            observability::BOOKINGS_CREATED_TOTAL,
            "status" => observability::status_label(status)
        )
        .increment(1);
        debug!(booking = %booking.id, listing = %booking.listing_id, %status, "booking created");

        match status {
            BookingStatus::Confirmed => self.notify.send(
                booking.renter_id,
                BookingNotice::Confirmed {
                    booking: booking.clone(),
                },
            ),
            _ => self.notify.send(
                booking.host_id,
                BookingNotice::Requested {
                    booking: booking.clone(),
                },
            ),
        }

        self.maybe_compact().await;
        Ok(booking)
    }

    /// Move a booking to `target` on behalf of `actor`.
    ///
    /// Ordering: load, authorize (actor mismatch is forbidden), check
    /// legality (illegal transition is invalid-request), then apply
    /// atomically under the calendar write lock. Concurrent transitions on
    /// one booking serialize on that lock; the loser fails against the
    /// committed state, not the state it originally read.
    ///
    /// `reason` is recorded only on cancellation, together with the
    /// timestamp and the cancelling user.
    pub async fn update_status(
        &self,
        booking_id: Ulid,
        actor: Actor,
        target: BookingStatus,
        reason: Option<String>,
    ) -> Result<Booking, BookingError> {
        if let Some(ref r) = reason
            && r.len() > MAX_REASON_LEN {
                return Err(BookingError::LimitExceeded("reason too long"));
            }

        let mut guard = self.resolve_booking_write(&booking_id).await?;
        let booking = guard
            .booking(&booking_id)
            .ok_or(BookingError::BookingNotFound(booking_id))?;
        let current = booking.status;

        let transition = Transition::toward(target).ok_or(BookingError::InvalidTransition {
            from: current,
            to: target,
        })?;
        lifecycle::authorize(booking, transition, actor)?;
        let next = lifecycle::next_status(current, transition)?;

        let now = Utc::now();
        let cancellation = if transition == Transition::Cancel {
            let cancelled_by = match actor {
                Actor::User(id) => id,
                // authorize() only admits the renter or the host here
                Actor::Service => return Err(BookingError::PartyOnly),
            };
            Some(Cancellation {
                reason,
                cancelled_at: now,
                cancelled_by,
            })
        } else {
            None
        };

        let event = Event::StatusChanged {
            id: booking_id,
            listing_id: guard.listing_id,
            status: next,
            cancellation,
            at: now,
        };
        self.persist_and_apply(&mut guard, &event).await?;

        let updated = guard
            .booking(&booking_id)
            .cloned()
            .ok_or(BookingError::BookingNotFound(booking_id))?;
        drop(guard);

        metrics::counter!(
            observability::STATUS_TRANSITIONS_TOTAL,
            "to" => observability::status_label(next)
        )
        .increment(1);
        debug!(booking = %booking_id, from = %current, to = %next, "booking status updated");

        match next {
            BookingStatus::Confirmed => self.notify.send(
                updated.renter_id,
                BookingNotice::Confirmed {
                    booking: updated.clone(),
                },
            ),
            BookingStatus::Cancelled => {
                // Tell the party that did not act
                let recipient = match updated.cancellation.as_ref().map(|c| c.cancelled_by) {
                    Some(id) if id == updated.renter_id => updated.host_id,
                    _ => updated.renter_id,
                };
                self.notify.send(
                    recipient,
                    BookingNotice::Cancelled {
                        booking: updated.clone(),
                    },
                );
            }
            _ => {}
        }

        self.maybe_compact().await;
        Ok(updated)
    }

    /// Rewrite the journal from live state once enough appends accumulate.
    /// Failures are logged and never fail the mutation that triggered them.
    async fn maybe_compact(&self) {
        if self.compact_threshold == 0 {
            return;
        }
        if self.journal_appends_since_snapshot().await < self.compact_threshold {
            return;
        }
        if let Err(e) = self.compact_journal().await {
            tracing::warn!("journal compaction failed: {e}");
        }
    }

    /// Rewrite the journal with one creation event per booking, each
    /// carrying the booking's current state. Replaying the result rebuilds
    /// exactly the live calendars.
    pub async fn compact_journal(&self) -> Result<(), BookingError> {
        let mut bookings = Vec::new();
        let calendar_ids: Vec<Ulid> = self.calendars.iter().map(|e| *e.key()).collect();
        for listing_id in calendar_ids {
            let Some(cal) = self.calendar(&listing_id) else {
                continue;
            };
            let guard = cal.read().await;
            bookings.extend(guard.bookings.iter().cloned());
        }
        // Replaying in creation order keeps the per-user indexes identical
        // to what the original journal produced
        bookings.sort_by_key(|b| (b.created_at, b.id));
        let events: Vec<Event> = bookings
            .into_iter()
            .map(|booking| Event::BookingCreated { booking })
            .collect();

        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Snapshot {
                events,
                response: tx,
            })
            .await
            .map_err(|_| BookingError::Unavailable("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::Unavailable("journal writer dropped response".into()))?
            .map_err(|e| BookingError::Unavailable(e.to_string()))
    }
}
