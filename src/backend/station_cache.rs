//! In-memory cache of the backend's station list

use serde::{Deserialize, Serialize};
use std::sync::{
    PoisonError, RwLock,
    atomic::{AtomicU64, Ordering},
};
use tracing::debug;

use crate::backend::StationDirectory;

/// A station as listed by `GET /stations`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub location: String,
}

/// Cached station list with a generation counter
///
/// The generation increases on every invalidation, so readers can tell a
/// refetch is due even when they never saw the list itself.
#[derive(Debug, Default)]
pub struct StationCache {
    stations: RwLock<Option<Vec<StationSummary>>>,
    generation: AtomicU64,
}

impl StationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly fetched station list
    pub fn store(&self, stations: Vec<StationSummary>) {
        *self
            .stations
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(stations);
    }

    /// Cached list, if still valid
    pub fn cached(&self) -> Option<Vec<StationSummary>> {
        self.stations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl StationDirectory for StationCache {
    fn invalidate_stations(&self) {
        self.stations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("Station list invalidated (generation {})", generation);
    }
}
