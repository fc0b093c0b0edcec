//! Station directory trait definition

/// The dashboard's view of registered stations
///
/// Onboarding only needs to tell it that the station list is out of date once
/// a new station has finished provisioning.
pub trait StationDirectory: Send + Sync + 'static {
    /// Mark cached station listings as stale
    fn invalidate_stations(&self);
}
