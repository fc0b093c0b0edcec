//! Transport adapter trait definition

use tokio::sync::mpsc::UnboundedSender;
use trait_variant::make;
use uuid::Uuid;

use crate::core::{error::TransportResult, types::DeviceId};

/// Receives one device identifier per advertisement seen during a scan
pub type DiscoverySink = UnboundedSender<DeviceId>;

/// Abstraction over the wireless link layer (typically BlueZ)
///
/// Implementations do not serialize overlapping calls for the same device.
/// Callers must finish `disconnect` before issuing another `connect`.
#[make(Send)]
pub trait TransportAdapter: Send + Sync + 'static {
    /// Prepare the radio stack
    ///
    /// Idempotent. Must be called before any other operation.
    async fn initialize(&self) -> TransportResult<()>;

    /// Start scanning for peripherals advertising `service`
    ///
    /// Every advertisement sends the device identifier into `on_discovered`,
    /// repeats included. The scan runs until `stop_scan` is called, which also
    /// drops the sink.
    async fn scan(&self, service: Uuid, on_discovered: DiscoverySink) -> TransportResult<()>;

    /// Stop an active scan. No-op when not scanning.
    async fn stop_scan(&self) -> TransportResult<()>;

    /// Establish a link with a peripheral offering `service`
    ///
    /// If the link layer has forgotten `device` (e.g. BlueZ expired it after
    /// discovery ended), the device is first requested again with a bounded
    /// scan filtered by `service`. Fails with `DeviceNotFound` if it does not
    /// show up in time.
    async fn connect(&self, device: &DeviceId, service: Uuid) -> TransportResult<()>;

    /// Tear down the link with a peripheral
    async fn disconnect(&self, device: &DeviceId) -> TransportResult<()>;

    /// Read a characteristic value
    ///
    /// Fails with `NotConnected` without an active link.
    async fn read_characteristic(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> TransportResult<Vec<u8>>;

    /// Write a characteristic value
    ///
    /// Fails with `NotConnected` without an active link.
    async fn write_characteristic(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> TransportResult<()>;
}
