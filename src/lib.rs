//! Booking engine for a rental marketplace.
//!
//! Grants exclusive date-range reservations of listings to competing
//! renters, prices stays deterministically in decimal arithmetic, and
//! enforces a role-gated status lifecycle. Per-listing write locks make
//! the conflict check and the insert atomic, so overlapping stays can
//! never both commit. State is durable through an append-only journal.
//!
//! This crate is a library contract: the surrounding service layer does
//! its own authentication, serialization, and HTTP mapping, and feeds the
//! engine listing snapshots through [`ListingDirectory`].

pub mod engine;
pub mod journal;
pub mod limits;
pub mod listings;
pub mod model;
pub mod notify;
pub mod observability;

pub use engine::{BookingEngine, BookingError, CreateBooking, EngineConfig, ErrorKind};
pub use listings::{DirectoryError, InMemoryListings, ListingDirectory};
pub use model::{Actor, Booking, BookingStatus, Listing, ListingStatus, Period, Quote};
pub use notify::{BookingNotice, NotifyHub};
