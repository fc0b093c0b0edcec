//! BlueZ transport adapter (central role)

use bluer::{
    Adapter, AdapterEvent, Address, Device, DiscoveryFilter, DiscoveryTransport,
    gatt::remote::Characteristic,
};
use futures::{Stream, StreamExt};
use std::{collections::HashSet, pin::pin, time::Duration};
use tokio::{
    sync::{Mutex, OnceCell, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    core::{
        error::{TransportError, TransportResult},
        types::DeviceId,
    },
    transport::adapter::{DiscoverySink, TransportAdapter},
};

/// Upper bound for GATT service discovery after connecting
const SERVICES_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);
const SERVICES_RESOLVE_POLL: Duration = Duration::from_millis(100);

/// Upper bound for finding a device BlueZ no longer knows about
const REDISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

struct BleStack {
    _session: bluer::Session,
    adapter: Adapter,
}

/// Transport adapter backed by BlueZ
pub struct BleTransport {
    adapter_name: Option<String>,
    stack: OnceCell<BleStack>,
    scan_task: Mutex<Option<JoinHandle<()>>>,
}

impl BleTransport {
    /// Create a transport for the named adapter, or the default one
    pub fn new(adapter_name: Option<String>) -> Self {
        Self {
            adapter_name,
            stack: OnceCell::new(),
            scan_task: Mutex::new(None),
        }
    }

    fn adapter(&self) -> TransportResult<&Adapter> {
        self.stack
            .get()
            .map(|stack| &stack.adapter)
            .ok_or(TransportError::NotInitialized)
    }

    fn device(&self, id: &DeviceId) -> TransportResult<Device> {
        let address = parse_address(id)?;
        self.adapter()?
            .device(address)
            .map_err(|_| TransportError::DeviceNotFound(id.clone()))
    }

    /// Device object for `id`, rediscovered by `service` if BlueZ dropped it
    ///
    /// BlueZ removes temporary devices some time after discovery ends, so a
    /// station found by an earlier scan may have to be looked up again.
    async fn locate(&self, id: &DeviceId, service: Uuid) -> TransportResult<Device> {
        let address = parse_address(id)?;
        let adapter = self.adapter()?;

        let known = adapter
            .device_addresses()
            .await
            .map_err(|e| connect_error(id, e))?;
        if !known.contains(&address) {
            info!("{} unknown to BlueZ, rediscovering", id);
            adapter
                .set_discovery_filter(service_filter(service))
                .await
                .map_err(scan_error)?;
            let events = adapter.discover_devices().await.map_err(scan_error)?;
            wait_for_device(events, address, id, REDISCOVERY_TIMEOUT).await?;
        }

        adapter
            .device(address)
            .map_err(|_| TransportError::DeviceNotFound(id.clone()))
    }

    /// Wait until BlueZ has discovered the GATT database of `device`
    async fn wait_for_services(&self, id: &DeviceId, device: &Device) -> TransportResult<()> {
        let resolved = tokio::time::timeout(SERVICES_RESOLVE_TIMEOUT, async {
            loop {
                if device.is_services_resolved().await? {
                    return Ok::<_, bluer::Error>(());
                }
                tokio::time::sleep(SERVICES_RESOLVE_POLL).await;
            }
        })
        .await;

        match resolved {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(connect_error(id, e)),
            Err(_) => Err(TransportError::Connect {
                device: id.clone(),
                reason: "timed out waiting for GATT services".to_string(),
            }),
        }
    }

    /// Find a characteristic on a connected device
    async fn characteristic(
        &self,
        id: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> TransportResult<Characteristic> {
        let device = self.device(id)?;
        if !device.is_connected().await.unwrap_or(false) {
            return Err(TransportError::NotConnected(id.clone()));
        }

        let not_found = || TransportError::CharacteristicNotFound {
            service,
            characteristic,
        };
        let lookup_failed = |e: bluer::Error| {
            debug!("GATT lookup on {} failed: {}", id, e);
            not_found()
        };

        for remote_service in device.services().await.map_err(lookup_failed)? {
            if remote_service.uuid().await.map_err(lookup_failed)? != service {
                continue;
            }
            for remote_char in remote_service
                .characteristics()
                .await
                .map_err(lookup_failed)?
            {
                if remote_char.uuid().await.map_err(lookup_failed)? == characteristic {
                    return Ok(remote_char);
                }
            }
        }

        Err(not_found())
    }
}

fn parse_address(id: &DeviceId) -> TransportResult<Address> {
    id.as_str()
        .parse()
        .map_err(|_| TransportError::InvalidDeviceId(id.to_string()))
}

fn service_filter(service: Uuid) -> DiscoveryFilter {
    DiscoveryFilter {
        uuids: HashSet::from([service]),
        transport: DiscoveryTransport::Le,
        duplicate_data: true,
        ..Default::default()
    }
}

fn unavailable(e: bluer::Error) -> TransportError {
    TransportError::AdapterUnavailable(e.to_string())
}

fn scan_error(e: bluer::Error) -> TransportError {
    TransportError::Scan(e.to_string())
}

fn connect_error(id: &DeviceId, e: bluer::Error) -> TransportError {
    TransportError::Connect {
        device: id.clone(),
        reason: e.to_string(),
    }
}

/// Whether a discovered device may be reported for `service`
///
/// The discovery filter already restricts results to `service`. A device
/// whose UUID list is not populated yet is trusted; only a known list that
/// lacks the service (a cached, unrelated device) is rejected.
fn matches_service(uuids: Option<&HashSet<Uuid>>, service: Uuid) -> bool {
    uuids.is_none_or(|uuids| uuids.is_empty() || uuids.contains(&service))
}

async fn advertises(adapter: &Adapter, address: Address, service: Uuid) -> bluer::Result<bool> {
    let uuids = adapter.device(address)?.uuids().await?;
    Ok(matches_service(uuids.as_ref(), service))
}

/// Wait for `address` to show up in a discovery event stream
///
/// Fails with `DeviceNotFound` when the stream ends or `timeout` elapses first.
async fn wait_for_device<S>(
    events: S,
    address: Address,
    id: &DeviceId,
    timeout: Duration,
) -> TransportResult<()>
where
    S: Stream<Item = AdapterEvent>,
{
    let mut events = pin!(events);
    let found = tokio::time::timeout(timeout, async {
        while let Some(event) = events.next().await {
            if matches!(event, AdapterEvent::DeviceAdded(added) if added == address) {
                return true;
            }
        }
        false
    })
    .await;

    match found {
        Ok(true) => {
            debug!("Rediscovered {}", id);
            Ok(())
        }
        Ok(false) => Err(TransportError::DeviceNotFound(id.clone())),
        Err(_) => {
            warn!("{} not seen within {:?}", id, timeout);
            Err(TransportError::DeviceNotFound(id.clone()))
        }
    }
}

impl TransportAdapter for BleTransport {
    async fn initialize(&self) -> TransportResult<()> {
        self.stack
            .get_or_try_init(|| async {
                let session = bluer::Session::new().await.map_err(unavailable)?;
                let adapter = match &self.adapter_name {
                    Some(name) => session.adapter(name),
                    None => session.default_adapter().await,
                }
                .map_err(unavailable)?;

                adapter.set_powered(true).await.map_err(unavailable)?;
                info!("Using BLE adapter: {}", adapter.name());

                Ok::<_, TransportError>(BleStack {
                    _session: session,
                    adapter,
                })
            })
            .await?;

        Ok(())
    }

    async fn scan(&self, service: Uuid, on_discovered: DiscoverySink) -> TransportResult<()> {
        let adapter = self.adapter()?.clone();
        adapter
            .set_discovery_filter(service_filter(service))
            .await
            .map_err(scan_error)?;

        let mut scan_task = self.scan_task.lock().await;
        if let Some(previous) = scan_task.take() {
            if !previous.is_finished() {
                warn!("Replacing active scan");
            }
            previous.abort();
        }

        let (started_tx, started_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let events = match adapter.discover_devices().await {
                Ok(events) => {
                    let _ = started_tx.send(Ok(()));
                    events
                }
                Err(e) => {
                    let _ = started_tx.send(Err(scan_error(e)));
                    return;
                }
            };
            let mut events = pin!(events);

            while let Some(event) = events.next().await {
                let AdapterEvent::DeviceAdded(address) = event else {
                    continue;
                };

                match advertises(&adapter, address, service).await {
                    Ok(true) => {
                        debug!("Discovered station {}", address);
                        if on_discovered.send(DeviceId::from(address.to_string())).is_err() {
                            break;
                        }
                    }
                    Ok(false) => debug!("Ignoring {} without provisioning service", address),
                    Err(e) => debug!("Could not inspect {}: {}", address, e),
                }
            }

            debug!("Discovery stream ended");
        });

        started_rx
            .await
            .map_err(|_| TransportError::Scan("discovery task ended unexpectedly".to_string()))??;

        *scan_task = Some(task);
        info!("Scanning for service {}", service);
        Ok(())
    }

    async fn stop_scan(&self) -> TransportResult<()> {
        if let Some(task) = self.scan_task.lock().await.take() {
            // Dropping the event stream ends discovery and the sink
            task.abort();
            let _ = task.await;
            info!("Scan stopped");
        }
        Ok(())
    }

    async fn connect(&self, id: &DeviceId, service: Uuid) -> TransportResult<()> {
        let device = self.locate(id, service).await?;

        if !device
            .is_connected()
            .await
            .map_err(|e| connect_error(id, e))?
        {
            debug!("Connecting to {}", id);
            device.connect().await.map_err(|e| connect_error(id, e))?;
        }

        self.wait_for_services(id, &device).await
    }

    async fn disconnect(&self, id: &DeviceId) -> TransportResult<()> {
        debug!("Disconnecting from {}", id);
        self.device(id)?
            .disconnect()
            .await
            .map_err(|e| TransportError::Disconnect {
                device: id.clone(),
                reason: e.to_string(),
            })
    }

    async fn read_characteristic(
        &self,
        id: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> TransportResult<Vec<u8>> {
        let remote = self.characteristic(id, service, characteristic).await?;
        let value = remote.read().await.map_err(|e| TransportError::Read {
            characteristic,
            reason: e.to_string(),
        })?;

        debug!("Read {} bytes from {}", value.len(), characteristic);
        Ok(value)
    }

    async fn write_characteristic(
        &self,
        id: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> TransportResult<()> {
        let remote = self.characteristic(id, service, characteristic).await?;
        remote
            .write(value)
            .await
            .map_err(|e| TransportError::Write {
                characteristic,
                reason: e.to_string(),
            })?;

        debug!("Wrote {} bytes to {}", value.len(), characteristic);
        Ok(())
    }
}
