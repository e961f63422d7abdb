use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Booking;

const CHANNEL_CAPACITY: usize = 256;

/// Booking event delivered to a user. Best-effort: emission never blocks
/// or fails the booking operation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingNotice {
    /// A renter asked for dates; goes to the host.
    Requested { booking: Booking },
    /// The booking is locked in; goes to the renter.
    Confirmed { booking: Booking },
    /// One party backed out; goes to the other.
    Cancelled { booking: Booking },
}

impl BookingNotice {
    pub fn booking(&self) -> &Booking {
        match self {
            BookingNotice::Requested { booking }
            | BookingNotice::Confirmed { booking }
            | BookingNotice::Cancelled { booking } => booking,
        }
    }
}

/// Broadcast hub for booking notices, keyed by recipient user id.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<BookingNotice>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to notices addressed to a user. Creates the channel if needed.
    pub fn subscribe(&self, user_id: Ulid) -> broadcast::Receiver<BookingNotice> {
        let sender = self
            .channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notice. No-op if nobody is listening.
    pub fn send(&self, user_id: Ulid, notice: BookingNotice) {
        if let Some(sender) = self.channels.get(&user_id) {
            let _ = sender.send(notice);
        }
    }
}
