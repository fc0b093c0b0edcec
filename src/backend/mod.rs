//! Station backend seam used by onboarding

pub mod station_cache;
pub mod station_directory;

pub use station_cache::{StationCache, StationSummary};
pub use station_directory::StationDirectory;
