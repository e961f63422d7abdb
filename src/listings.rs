use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use ulid::Ulid;

use crate::model::Listing;

/// Transient failure talking to the listing store. Surfaces to booking
/// callers as the `Unavailable` error kind; they may retry, the engine
/// never does.
#[derive(Debug, Error)]
#[error("listing directory unavailable: {0}")]
pub struct DirectoryError(pub String);

/// Read-only listing lookup collaborator. The engine owns none of the
/// listing lifecycle — it only fetches snapshots at booking time.
#[async_trait]
pub trait ListingDirectory: Send + Sync {
    /// Fetch a listing snapshot by id. `Ok(None)` when no such listing exists.
    async fn get(&self, id: Ulid) -> Result<Option<Listing>, DirectoryError>;
}

/// DashMap-backed directory for tests and embedded deployments.
#[derive(Default)]
pub struct InMemoryListings {
    listings: DashMap<Ulid, Listing>,
}

impl InMemoryListings {
    pub fn new() -> Self {
        Self {
            listings: DashMap::new(),
        }
    }

    pub fn insert(&self, listing: Listing) {
        self.listings.insert(listing.id, listing);
    }

    pub fn remove(&self, id: &Ulid) {
        self.listings.remove(id);
    }
}

#[async_trait]
impl ListingDirectory for InMemoryListings {
    async fn get(&self, id: Ulid) -> Result<Option<Listing>, DirectoryError> {
        Ok(self.listings.get(&id).map(|e| e.value().clone()))
    }
}
