mod availability;
mod error;
mod lifecycle;
mod mutations;
mod pricing;
mod queries;

pub use availability::{booked_ranges, has_conflict};
pub use error::{BookingError, ErrorKind};
pub use lifecycle::Transition;
pub use mutations::CreateBooking;
pub use pricing::quote;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::journal::Journal;
use crate::listings::ListingDirectory;
use crate::model::*;
use crate::notify::NotifyHub;

pub type SharedCalendar = Arc<RwLock<ListingCalendar>>;

/// Engine configuration. The journal at `journal_path` is the system of
/// record; everything else is rebuilt from it on open.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub journal_path: PathBuf,
    /// Rewrite the journal from live state once this many appends
    /// accumulate. Zero disables opportunistic compaction.
    pub compact_threshold: u64,
}

impl EngineConfig {
    pub fn new(journal_path: impl Into<PathBuf>) -> Self {
        Self {
            journal_path: journal_path.into(),
            compact_threshold: 10_000,
        }
    }
}

// ── Group-commit journal channel ─────────────────────────

pub(super) enum JournalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Snapshot {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceSnapshot {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the journal and batches appends for group
/// commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn journal_writer_loop(mut journal: Journal, mut rx: mpsc::Receiver<JournalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            JournalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(JournalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush the current batch first, then handle the
                            // non-append command
                            flush_and_respond(&mut journal, &mut batch);
                            handle_non_append(&mut journal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut journal, &mut batch);
                }
            }
            other => handle_non_append(&mut journal, other),
        }
    }
}

fn flush_and_respond(
    journal: &mut Journal,
    batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>,
) {
    metrics::histogram!(crate::observability::JOURNAL_FLUSH_BATCH_SIZE)
        .record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(journal, batch);
    metrics::histogram!(crate::observability::JOURNAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());

    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(
    journal: &mut Journal,
    batch: &[(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = journal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = journal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(journal: &mut Journal, cmd: JournalCommand) {
    match cmd {
        JournalCommand::Snapshot { events, response } => {
            let result = Journal::write_snapshot_file(journal.path(), &events)
                .and_then(|()| journal.install_snapshot());
            let _ = response.send(result);
        }
        JournalCommand::AppendsSinceSnapshot { response } => {
            let _ = response.send(journal.appends_since_snapshot());
        }
        JournalCommand::Append { .. } => unreachable!(),
    }
}

/// The booking engine: grants exclusive date ranges of listings, prices
/// stays, and walks bookings through their status lifecycle.
///
/// Safe to share across tasks. Each listing's calendar sits behind its own
/// `RwLock`; the conflict check and the insert run under one write-lock
/// acquisition, which is what keeps two racing creates for overlapping
/// dates from both committing.
pub struct BookingEngine {
    calendars: DashMap<Ulid, SharedCalendar>,
    /// Reverse lookup: booking id → listing id.
    bookings: DashMap<Ulid, Ulid>,
    /// Booking ids per renter, in creation order.
    by_renter: DashMap<Ulid, Vec<Ulid>>,
    /// Booking ids per host, in creation order.
    by_host: DashMap<Ulid, Vec<Ulid>>,
    listings: Arc<dyn ListingDirectory>,
    pub notify: Arc<NotifyHub>,
    journal_tx: mpsc::Sender<JournalCommand>,
    compact_threshold: u64,
}

impl BookingEngine {
    /// Replay the journal and start the group-commit writer. Must run
    /// inside a tokio runtime.
    pub fn open(
        config: EngineConfig,
        listings: Arc<dyn ListingDirectory>,
        notify: Arc<NotifyHub>,
    ) -> io::Result<Self> {
        let events = Journal::replay(&config.journal_path)?;
        let journal = Journal::open(&config.journal_path)?;
        let (journal_tx, journal_rx) = mpsc::channel(4096);
        tokio::spawn(journal_writer_loop(journal, journal_rx));

        let engine = Self {
            calendars: DashMap::new(),
            bookings: DashMap::new(),
            by_renter: DashMap::new(),
            by_host: DashMap::new(),
            listings,
            notify,
            journal_tx,
            compact_threshold: config.compact_threshold,
        };

        // Replay — we're the sole owner of the calendar Arcs, so try_write
        // always succeeds instantly (no contention).
        for event in &events {
            let cal = engine.calendar_or_default(event.listing_id());
            let mut guard = cal.try_write().expect("replay: uncontended write");
            engine.apply_to_calendar(&mut guard, event);
        }

        Ok(engine)
    }

    pub fn calendar(&self, listing_id: &Ulid) -> Option<SharedCalendar> {
        self.calendars.get(listing_id).map(|e| e.value().clone())
    }

    /// Calendars are created lazily — listings live elsewhere, a calendar
    /// exists once the first booking for it arrives.
    pub(super) fn calendar_or_default(&self, listing_id: Ulid) -> SharedCalendar {
        self.calendars
            .entry(listing_id)
            .or_insert_with(|| Arc::new(RwLock::new(ListingCalendar::new(listing_id))))
            .value()
            .clone()
    }

    pub fn listing_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.bookings.get(booking_id).map(|e| *e.value())
    }

    /// Apply a journaled event to a calendar (no locking — caller holds the
    /// write lock).
    fn apply_to_calendar(&self, cal: &mut ListingCalendar, event: &Event) {
        match event {
            Event::BookingCreated { booking } => {
                self.bookings.insert(booking.id, booking.listing_id);
                self.by_renter
                    .entry(booking.renter_id)
                    .or_default()
                    .push(booking.id);
                self.by_host
                    .entry(booking.host_id)
                    .or_default()
                    .push(booking.id);
                cal.insert_booking(booking.clone());
            }
            Event::StatusChanged {
                id,
                status,
                cancellation,
                at,
                ..
            } => {
                if let Some(b) = cal.booking_mut(id) {
                    b.status = *status;
                    if cancellation.is_some() {
                        b.cancellation = cancellation.clone();
                    }
                    b.updated_at = *at;
                }
            }
        }
    }

    /// Write an event to the journal via the background group-commit writer.
    async fn journal_append(&self, event: &Event) -> Result<(), BookingError> {
        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| BookingError::Unavailable("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::Unavailable("journal writer dropped response".into()))?
            .map_err(|e| BookingError::Unavailable(e.to_string()))
    }

    /// Journal-append + apply in one call. The event is durable before the
    /// in-memory state changes, so readers never observe an uncommitted
    /// booking.
    pub(super) async fn persist_and_apply(
        &self,
        cal: &mut ListingCalendar,
        event: &Event,
    ) -> Result<(), BookingError> {
        self.journal_append(event).await?;
        self.apply_to_calendar(cal, event);
        Ok(())
    }

    /// Look up a booking's listing and take the calendar write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<ListingCalendar>, BookingError> {
        let listing_id = self
            .listing_for_booking(booking_id)
            .ok_or(BookingError::BookingNotFound(*booking_id))?;
        let cal = self
            .calendar(&listing_id)
            .ok_or(BookingError::BookingNotFound(*booking_id))?;
        Ok(cal.write_owned().await)
    }

    pub(super) async fn journal_appends_since_snapshot(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .journal_tx
            .send(JournalCommand::AppendsSinceSnapshot { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
