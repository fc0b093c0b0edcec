//! Discovery of stations advertising the provisioning service

use std::sync::Arc;
use tokio::{
    sync::{Mutex, mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    core::{error::TransportResult, types::DeviceId},
    transport::{TransportAdapter, ble::PROVISIONING_SERVICE_UUID},
};

/// Station discovery service
///
/// Accumulates the distinct stations seen since the scan started, in discovery
/// order, and publishes a snapshot of the whole set on every addition.
pub struct DiscoveryScanner<T: TransportAdapter> {
    transport: Arc<T>,
    candidates: Arc<watch::Sender<Vec<DeviceId>>>,
    accumulator: Mutex<Option<JoinHandle<()>>>,
}

impl<T: TransportAdapter> DiscoveryScanner<T> {
    /// Create a new scanner on the given transport
    pub fn new(transport: Arc<T>) -> Self {
        let (candidates, _) = watch::channel(Vec::new());
        Self {
            transport,
            candidates: Arc::new(candidates),
            accumulator: Mutex::new(None),
        }
    }

    /// Start scanning
    ///
    /// While a scan is running this only subscribes to it; no second scan is
    /// started. A fresh scan starts with an empty candidate set.
    pub async fn start(&self) -> TransportResult<watch::Receiver<Vec<DeviceId>>> {
        let mut accumulator = self.accumulator.lock().await;
        if accumulator
            .as_ref()
            .is_some_and(|running| !running.is_finished())
        {
            debug!("Scan already running, subscribing");
            return Ok(self.candidates.subscribe());
        }
        if accumulator.take().is_some() {
            debug!("Previous scan ended on its own, restarting");
        }

        self.transport.initialize().await?;
        self.candidates.send_replace(Vec::new());

        let (sink, mut discovered) = mpsc::unbounded_channel();
        self.transport.scan(PROVISIONING_SERVICE_UUID, sink).await?;

        let candidates = self.candidates.clone();
        *accumulator = Some(tokio::spawn(async move {
            while let Some(device) = discovered.recv().await {
                let added = candidates.send_if_modified(|set| {
                    if set.contains(&device) {
                        false
                    } else {
                        set.push(device.clone());
                        true
                    }
                });

                if added {
                    info!("Found station {}", device);
                }
            }
        }));

        info!("Station discovery started");
        Ok(self.candidates.subscribe())
    }

    /// Stop scanning
    ///
    /// Returns once every discovery already reported by the transport has been
    /// absorbed into the candidate set.
    pub async fn stop(&self) -> TransportResult<()> {
        let Some(accumulator) = self.accumulator.lock().await.take() else {
            return Ok(());
        };

        if let Err(e) = self.transport.stop_scan().await {
            accumulator.abort();
            let _ = accumulator.await;
            return Err(e);
        }

        // The transport dropped its sink, so this ends after draining
        if let Err(e) = accumulator.await {
            warn!("Discovery accumulator ended abnormally: {}", e);
        }

        info!(
            "Station discovery stopped with {} candidate(s)",
            self.candidates.borrow().len()
        );
        Ok(())
    }

    /// Stations found so far, in discovery order
    pub fn candidates(&self) -> Vec<DeviceId> {
        self.candidates.borrow().clone()
    }

    /// Subscribe to candidate snapshots
    pub fn subscribe(&self) -> watch::Receiver<Vec<DeviceId>> {
        self.candidates.subscribe()
    }

    /// Whether discoveries are still being accumulated
    ///
    /// False once the transport ended the scan, even without `stop()`.
    pub async fn is_scanning(&self) -> bool {
        self.accumulator
            .lock()
            .await
            .as_ref()
            .is_some_and(|running| !running.is_finished())
    }
}
