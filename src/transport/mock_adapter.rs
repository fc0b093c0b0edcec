//! Mock transport adapter for testing

use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::{
    error::{TransportError, TransportResult},
    types::DeviceId,
};
use crate::transport::adapter::{DiscoverySink, TransportAdapter};

/// Internal state for the mock transport
#[derive(Debug, Default)]
struct MockState {
    initialize_calls: usize,
    scan_sink: Option<DiscoverySink>,
    scan_calls: usize,
    connected: HashSet<DeviceId>,
    overlapping_connects: usize,
    connect_calls: usize,
    connect_services: Vec<Uuid>,
    disconnect_calls: usize,
    read_calls: usize,
    should_fail_scan: bool,
    should_fail_connect: bool,
    should_fail_write: bool,
    status: Vec<u8>,
    read_script: VecDeque<TransportResult<Vec<u8>>>,
    writes: Vec<(DeviceId, Uuid, Vec<u8>)>,
}

/// Mock transport adapter for testing
///
/// Reads return scripted results first, then the configured status payload.
/// A `connect` issued while the same device is still connected is counted as
/// an overlap instead of failing, so tests can assert on it afterwards.
#[derive(Debug, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a new mock reporting `AwaitingSettings`
    pub fn new() -> Self {
        let state = MockState {
            status: br#"{"_type":"AwaitingSettings"}"#.to_vec(),
            ..Default::default()
        };
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Payload returned once the read script is exhausted
    pub async fn set_status(&self, payload: &[u8]) {
        self.inner.lock().await.status = payload.to_vec();
    }

    /// Queue results for upcoming reads, in order
    pub async fn script_reads(&self, results: Vec<TransportResult<Vec<u8>>>) {
        self.inner.lock().await.read_script.extend(results);
    }

    pub async fn set_scan_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_scan = should_fail;
    }

    pub async fn set_connect_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_connect = should_fail;
    }

    pub async fn set_write_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_write = should_fail;
    }

    /// Simulate an advertisement from `device`
    ///
    /// Returns false when no scan is active.
    pub async fn advertise(&self, device: &str) -> bool {
        match &self.inner.lock().await.scan_sink {
            Some(sink) => sink.send(DeviceId::from(device)).is_ok(),
            None => false,
        }
    }

    pub async fn is_scanning(&self) -> bool {
        self.inner.lock().await.scan_sink.is_some()
    }

    pub async fn initialize_calls(&self) -> usize {
        self.inner.lock().await.initialize_calls
    }

    pub async fn scan_calls(&self) -> usize {
        self.inner.lock().await.scan_calls
    }

    pub async fn connect_calls(&self) -> usize {
        self.inner.lock().await.connect_calls
    }

    /// Service each `connect` asked for, in call order
    pub async fn connect_services(&self) -> Vec<Uuid> {
        self.inner.lock().await.connect_services.clone()
    }

    pub async fn disconnect_calls(&self) -> usize {
        self.inner.lock().await.disconnect_calls
    }

    pub async fn read_calls(&self) -> usize {
        self.inner.lock().await.read_calls
    }

    pub async fn overlapping_connects(&self) -> usize {
        self.inner.lock().await.overlapping_connects
    }

    pub async fn is_connected(&self, device: &DeviceId) -> bool {
        self.inner.lock().await.connected.contains(device)
    }

    pub async fn writes(&self) -> Vec<(DeviceId, Uuid, Vec<u8>)> {
        self.inner.lock().await.writes.clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportAdapter for MockTransport {
    async fn initialize(&self) -> TransportResult<()> {
        self.inner.lock().await.initialize_calls += 1;
        Ok(())
    }

    async fn scan(&self, _service: Uuid, on_discovered: DiscoverySink) -> TransportResult<()> {
        let mut state = self.inner.lock().await;
        if state.should_fail_scan {
            return Err(TransportError::Scan("Mock scan failure".into()));
        }
        state.scan_calls += 1;
        state.scan_sink = Some(on_discovered);
        Ok(())
    }

    async fn stop_scan(&self) -> TransportResult<()> {
        self.inner.lock().await.scan_sink = None;
        Ok(())
    }

    async fn connect(&self, device: &DeviceId, service: Uuid) -> TransportResult<()> {
        {
            let mut state = self.inner.lock().await;
            state.connect_calls += 1;
            state.connect_services.push(service);
            if state.should_fail_connect {
                return Err(TransportError::Connect {
                    device: device.clone(),
                    reason: "Mock connect failure".into(),
                });
            }
            if !state.connected.insert(device.clone()) {
                state.overlapping_connects += 1;
            }
        }

        // Give other tasks a chance to interleave while the link is up
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn disconnect(&self, device: &DeviceId) -> TransportResult<()> {
        let mut state = self.inner.lock().await;
        state.disconnect_calls += 1;
        state.connected.remove(device);
        Ok(())
    }

    async fn read_characteristic(
        &self,
        device: &DeviceId,
        _service: Uuid,
        _characteristic: Uuid,
    ) -> TransportResult<Vec<u8>> {
        let result = {
            let mut state = self.inner.lock().await;
            state.read_calls += 1;
            if !state.connected.contains(device) {
                return Err(TransportError::NotConnected(device.clone()));
            }
            match state.read_script.pop_front() {
                Some(result) => result,
                None => Ok(state.status.clone()),
            }
        };

        tokio::task::yield_now().await;
        result
    }

    async fn write_characteristic(
        &self,
        device: &DeviceId,
        _service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> TransportResult<()> {
        let mut state = self.inner.lock().await;
        if !state.connected.contains(device) {
            return Err(TransportError::NotConnected(device.clone()));
        }
        if state.should_fail_write {
            return Err(TransportError::Write {
                characteristic,
                reason: "Mock write failure".into(),
            });
        }
        state
            .writes
            .push((device.clone(), characteristic, value.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ble::uuids::{
        COMMAND_CHAR_UUID, PROVISIONING_SERVICE_UUID, STATUS_CHAR_UUID,
    };
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_mock_read_requires_connection() {
        let transport = MockTransport::new();
        let device = DeviceId::from("AA:BB:CC:DD:EE:FF");

        let result = transport
            .read_characteristic(&device, PROVISIONING_SERVICE_UUID, STATUS_CHAR_UUID)
            .await;
        assert_eq!(result, Err(TransportError::NotConnected(device.clone())));

        assert_ok!(transport.connect(&device, PROVISIONING_SERVICE_UUID).await);
        let value = assert_ok!(
            transport
                .read_characteristic(&device, PROVISIONING_SERVICE_UUID, STATUS_CHAR_UUID)
                .await
        );
        assert_eq!(value, br#"{"_type":"AwaitingSettings"}"#.to_vec());
    }

    #[tokio::test]
    async fn test_mock_scripted_reads() {
        let transport = MockTransport::new();
        let device = DeviceId::from("AA:BB:CC:DD:EE:FF");
        transport
            .script_reads(vec![
                Ok(b"first".to_vec()),
                Err(TransportError::Read {
                    characteristic: STATUS_CHAR_UUID,
                    reason: "boom".into(),
                }),
            ])
            .await;
        transport.connect(&device, PROVISIONING_SERVICE_UUID).await.unwrap();

        let mut results = Vec::new();
        for _ in 0..3 {
            results.push(
                transport
                    .read_characteristic(&device, PROVISIONING_SERVICE_UUID, STATUS_CHAR_UUID)
                    .await,
            );
        }

        assert_eq!(results[0], Ok(b"first".to_vec()));
        assert_err!(&results[1]);
        assert_eq!(results[2], Ok(br#"{"_type":"AwaitingSettings"}"#.to_vec()));
    }

    #[tokio::test]
    async fn test_mock_counts_overlapping_connects() {
        let transport = MockTransport::new();
        let device = DeviceId::from("AA:BB:CC:DD:EE:FF");

        transport.connect(&device, PROVISIONING_SERVICE_UUID).await.unwrap();
        transport.connect(&device, PROVISIONING_SERVICE_UUID).await.unwrap();
        assert_eq!(transport.overlapping_connects().await, 1);

        transport.disconnect(&device).await.unwrap();
        transport.connect(&device, PROVISIONING_SERVICE_UUID).await.unwrap();
        assert_eq!(transport.overlapping_connects().await, 1);
    }

    #[tokio::test]
    async fn test_mock_scan_sink_dropped_on_stop() {
        let transport = MockTransport::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        transport.scan(PROVISIONING_SERVICE_UUID, tx).await.unwrap();
        assert!(transport.advertise("AA:BB:CC:DD:EE:FF").await);

        transport.stop_scan().await.unwrap();
        assert!(!transport.advertise("AA:BB:CC:DD:EE:FF").await);

        assert_eq!(rx.recv().await, Some(DeviceId::from("AA:BB:CC:DD:EE:FF")));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_mock_write_records_payload() {
        let transport = MockTransport::new();
        let device = DeviceId::from("AA:BB:CC:DD:EE:FF");
        transport.connect(&device, PROVISIONING_SERVICE_UUID).await.unwrap();

        transport
            .write_characteristic(&device, PROVISIONING_SERVICE_UUID, COMMAND_CHAR_UUID, b"{}")
            .await
            .unwrap();

        assert_eq!(
            transport.writes().await,
            vec![(device, COMMAND_CHAR_UUID, b"{}".to_vec())]
        );
    }
}
