use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Append-only journal of booking events.
///
/// Format per entry: `[u32: len][bincode: Event][u32: crc32]`
/// - `len` is the byte length of the bincode payload (not including the CRC).
/// - A truncated last entry (crash mid-write) is safely discarded on replay
///   via the length-prefix + CRC check.
pub struct Journal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_snapshot: u64,
}

fn encode_entry(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

impl Journal {
    /// Open (or create) the journal file at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_snapshot: 0,
        })
    }

    /// Buffer a single event without flushing or syncing. Call `flush_sync`
    /// after the batch to durably commit everything buffered — the writer
    /// task batches appends for group commit.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        encode_entry(&mut self.writer, event)?;
        self.appends_since_snapshot += 1;
        Ok(())
    }

    /// Flush the buffer and fsync the underlying file.
    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    /// Append a single event and fsync. Test convenience — production code
    /// goes through `append_buffered` + `flush_sync`.
    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_snapshot(&self) -> u64 {
        self.appends_since_snapshot
    }

    /// Write a snapshot (the minimal event set recreating current state) to
    /// a temp file and fsync it. Slow I/O phase — runs before the swap.
    pub fn write_snapshot_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let tmp_path = path.with_extension("journal.tmp");
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        for event in events {
            encode_entry(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Atomic swap: rename the snapshot over the journal and reopen.
    pub fn install_snapshot(&mut self) -> io::Result<()> {
        let tmp_path = self.path.with_extension("journal.tmp");
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_snapshot = 0;
        Ok(())
    }

    /// Both snapshot phases in one call. Test convenience.
    #[cfg(test)]
    pub fn snapshot(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_snapshot_file(&self.path, events)?;
        self.install_snapshot()
    }

    /// Replay the journal from disk, returning all valid events in order.
    /// A truncated or corrupt trailing entry ends the replay silently.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();

        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            let len = u32::from_le_bytes(len_buf) as usize;

            let mut payload = vec![0u8; len];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break, // truncated
                Err(e) => return Err(e),
            }

            let mut crc_buf = [0u8; 4];
            match reader.read_exact(&mut crc_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break, // truncated
                Err(e) => return Err(e),
            }
            if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
                break; // corrupt entry — stop replaying
            }

            match bincode::deserialize::<Event>(&payload) {
                Ok(event) => events.push(event),
                Err(_) => break, // corrupt payload
            }
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use ulid::Ulid;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("lodgic_test_journal");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn created(day: u32) -> Event {
        let at = Utc.with_ymd_and_hms(2030, 7, day, 0, 0, 0).unwrap();
        Event::BookingCreated {
            booking: Booking {
                id: Ulid::new(),
                listing_id: Ulid::new(),
                renter_id: Ulid::new(),
                host_id: Ulid::new(),
                period: Period::new(at, at + chrono::Duration::days(2)),
                quote: Quote {
                    subtotal: dec!(200.00),
                    service_fee: dec!(20.00),
                    total_amount: dec!(220.00),
                    currency: "USD".into(),
                },
                status: BookingStatus::Pending,
                payment_intent_id: None,
                cancellation: None,
                message: None,
                created_at: at,
                updated_at: at,
            },
        }
    }

    fn status_changed(event: &Event) -> Event {
        let Event::BookingCreated { booking } = event else {
            panic!("expected a creation event");
        };
        Event::StatusChanged {
            id: booking.id,
            listing_id: booking.listing_id,
            status: BookingStatus::Confirmed,
            cancellation: None,
            at: booking.created_at,
        }
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.journal");
        let first = created(1);
        let events = vec![first.clone(), status_changed(&first)];

        {
            let mut journal = Journal::open(&path).unwrap();
            for e in &events {
                journal.append(e).unwrap();
            }
        }

        let replayed = Journal::replay(&path).unwrap();
        assert_eq!(replayed, events);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_discards_truncated_tail() {
        let path = tmp_path("truncated_tail.journal");
        let event = created(2);

        {
            let mut journal = Journal::open(&path).unwrap();
            journal.append(&event).unwrap();
        }

        // Garbage simulating a crash mid-write of a second entry
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[0u8; 6]).unwrap();
        }

        let replayed = Journal::replay(&path).unwrap();
        assert_eq!(replayed, vec![event]);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_missing_file_is_empty() {
        let path = tmp_path("missing.journal");
        let _ = fs::remove_file(&path);
        assert!(Journal::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn replay_stops_at_corrupt_crc() {
        let path = tmp_path("corrupt_crc.journal");
        let event = created(3);

        {
            let payload = bincode::serialize(&event).unwrap();
            let len = payload.len() as u32;
            let bad_crc: u32 = 0xDEADBEEF;

            let mut f = File::create(&path).unwrap();
            f.write_all(&len.to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&bad_crc.to_le_bytes()).unwrap();
        }

        assert!(Journal::replay(&path).unwrap().is_empty());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn snapshot_shrinks_journal() {
        let path = tmp_path("snapshot_shrink.journal");
        let first = created(4);

        {
            let mut journal = Journal::open(&path).unwrap();
            journal.append(&first).unwrap();
            // churn: a pile of status flips
            for _ in 0..20 {
                journal.append(&status_changed(&first)).unwrap();
            }
        }

        let before = fs::metadata(&path).unwrap().len();

        // Snapshot collapses to the single creation event in current state
        {
            let mut journal = Journal::open(&path).unwrap();
            journal.snapshot(std::slice::from_ref(&first)).unwrap();
        }

        let after = fs::metadata(&path).unwrap().len();
        assert!(after < before, "snapshot should shrink: {after} < {before}");
        assert_eq!(Journal::replay(&path).unwrap(), vec![first]);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn snapshot_then_append() {
        let path = tmp_path("snapshot_append.journal");
        let first = created(5);
        let later = status_changed(&first);

        {
            let mut journal = Journal::open(&path).unwrap();
            journal.append(&first).unwrap();
            journal.snapshot(std::slice::from_ref(&first)).unwrap();
            journal.append(&later).unwrap();
        }

        let replayed = Journal::replay(&path).unwrap();
        assert_eq!(replayed, vec![first, later]);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn buffered_appends_commit_on_flush() {
        let path = tmp_path("buffered_flush.journal");
        let events: Vec<Event> = (1..=5).map(created).collect();

        {
            let mut journal = Journal::open(&path).unwrap();
            for e in &events {
                journal.append_buffered(e).unwrap();
            }
            assert_eq!(journal.appends_since_snapshot(), 5);
            journal.flush_sync().unwrap();
        }

        assert_eq!(Journal::replay(&path).unwrap(), events);

        let _ = fs::remove_file(&path);
    }
}
