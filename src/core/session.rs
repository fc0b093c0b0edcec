//! Provisioning session: configuration push and status polling
//!
//! The station is the source of truth for onboarding progress. The session
//! pushes the configuration once and then only records whatever state the
//! station reports; it never decides the next state itself.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::{Mutex, RwLock, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::{
    core::{
        error::{OnboardingError, OnboardingResult},
        types::{DeviceId, OnboardingConfig, OnboardingState, SessionPhase},
    },
    protocol::{decode_state, encode_config},
    transport::{
        TransportAdapter,
        ble::{COMMAND_CHAR_UUID, PROVISIONING_SERVICE_UUID, STATUS_CHAR_UUID},
    },
};

/// Default status poll period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Session phase state machine
#[derive(Debug)]
struct SessionStateMachine {
    phase: SessionPhase,
    submitted: bool,
}

impl SessionStateMachine {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            submitted: false,
        }
    }

    /// Start pushing a configuration, again if one was already delivered
    fn begin_submit(&mut self) -> OnboardingResult<()> {
        match self.phase {
            SessionPhase::Idle | SessionPhase::Submitted => {
                self.phase = SessionPhase::Submitting;
                Ok(())
            }
            _ => Err(OnboardingError::OperationInProgress),
        }
    }

    /// Finish a configuration push
    fn finish_submit(&mut self, succeeded: bool) {
        self.submitted |= succeeded;
        self.phase = self.resting_phase();
    }

    /// Start the polling loop
    fn begin_polling(&mut self) -> OnboardingResult<()> {
        match self.phase {
            SessionPhase::Idle | SessionPhase::Submitted => {
                self.phase = SessionPhase::Polling;
                Ok(())
            }
            _ => Err(OnboardingError::OperationInProgress),
        }
    }

    /// Polling loop ended
    fn stop_polling(&mut self) {
        self.phase = self.resting_phase();
    }

    fn resting_phase(&self) -> SessionPhase {
        if self.submitted {
            SessionPhase::Submitted
        } else {
            SessionPhase::Idle
        }
    }
}

/// Onboarding session with a single station
///
/// Every transport cycle of the session (one submit or one poll) runs under a
/// per-session link guard, so cycles never interleave on the device.
pub struct ProvisioningSession<T: TransportAdapter> {
    device: DeviceId,
    transport: Arc<T>,
    state_machine: Arc<RwLock<SessionStateMachine>>,
    latest: Arc<watch::Sender<OnboardingState>>,
    link: Arc<Mutex<()>>,
    malformed: Arc<AtomicU64>,
}

impl<T: TransportAdapter> Clone for ProvisioningSession<T> {
    fn clone(&self) -> Self {
        Self {
            device: self.device.clone(),
            transport: self.transport.clone(),
            state_machine: self.state_machine.clone(),
            latest: self.latest.clone(),
            link: self.link.clone(),
            malformed: self.malformed.clone(),
        }
    }
}

impl<T: TransportAdapter> ProvisioningSession<T> {
    /// Create a session targeting `device`
    pub fn new(transport: Arc<T>, device: DeviceId) -> Self {
        let (latest, _) = watch::channel(OnboardingState::default());
        Self {
            device,
            transport,
            state_machine: Arc::new(RwLock::new(SessionStateMachine::new())),
            latest: Arc::new(latest),
            link: Arc::new(Mutex::new(())),
            malformed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Push the configuration to the station
    ///
    /// Connects, writes the encoded configuration to the command
    /// characteristic and disconnects. On failure the session returns to its
    /// previous resting phase and the caller may retry.
    pub async fn submit(&self, config: &OnboardingConfig) -> OnboardingResult<DeviceId> {
        self.state_machine.write().await.begin_submit()?;

        let result = self.push_config(config).await;
        self.state_machine
            .write()
            .await
            .finish_submit(result.is_ok());

        match result {
            Ok(()) => {
                info!("Configuration for '{}' sent to {}", config.name, self.device);
                Ok(self.device.clone())
            }
            Err(e) => {
                warn!("Sending configuration to {} failed: {}", self.device, e);
                Err(e)
            }
        }
    }

    async fn push_config(&self, config: &OnboardingConfig) -> OnboardingResult<()> {
        let payload = encode_config(config)?;

        let _link = self.link.lock().await;
        self.transport.initialize().await?;
        self.transport
            .connect(&self.device, PROVISIONING_SERVICE_UUID)
            .await?;

        let written = self
            .transport
            .write_characteristic(
                &self.device,
                PROVISIONING_SERVICE_UUID,
                COMMAND_CHAR_UUID,
                &payload,
            )
            .await;
        let disconnected = self.disconnect_after(written.is_err()).await;

        written?;
        disconnected?;
        debug!("Wrote {} byte configuration to {}", payload.len(), self.device);
        Ok(())
    }

    /// Read and decode the station's current state
    ///
    /// Each call is a full connect, read, disconnect cycle.
    pub async fn poll_once(&self) -> OnboardingResult<OnboardingState> {
        let payload = {
            let _link = self.link.lock().await;
            self.transport.initialize().await?;
            self.transport
                .connect(&self.device, PROVISIONING_SERVICE_UUID)
                .await?;

            let read = self
                .transport
                .read_characteristic(&self.device, PROVISIONING_SERVICE_UUID, STATUS_CHAR_UUID)
                .await;
            let disconnected = self.disconnect_after(read.is_err()).await;

            let payload = read?;
            disconnected?;
            payload
        };

        let state = decode_state(&payload).map_err(|e| {
            let count = self.malformed.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                device = %self.device,
                payload = %hex::encode(&payload),
                count,
                "Malformed status payload: {}", e
            );
            e
        })?;

        self.observe(state.clone());
        Ok(state)
    }

    /// Disconnect, logging the failure if an earlier error takes precedence
    async fn disconnect_after(&self, earlier_failed: bool) -> OnboardingResult<()> {
        let result = self.transport.disconnect(&self.device).await;
        if earlier_failed {
            if let Err(e) = &result {
                warn!("Disconnecting from {} failed: {}", self.device, e);
            }
        }
        Ok(result?)
    }

    fn observe(&self, state: OnboardingState) {
        let changed = self.latest.send_if_modified(|latest| {
            if *latest == state {
                false
            } else {
                *latest = state.clone();
                true
            }
        });

        if changed {
            info!("Station {} reports: {}", self.device, state);
        }
    }

    /// Poll the station every `interval` until cancelled
    ///
    /// Each successful read is passed to `on_update`. A failed tick is logged
    /// and skipped; the next tick retries at the same period. A terminal state
    /// does not stop polling.
    pub async fn start_polling<F>(
        &self,
        interval: Duration,
        mut on_update: F,
    ) -> OnboardingResult<PollingHandle>
    where
        F: FnMut(&OnboardingState) + Send + 'static,
    {
        self.state_machine.write().await.begin_polling()?;

        let (cancel, mut cancelled) = watch::channel(false);
        let session = self.clone();
        let period = interval.max(MIN_POLL_INTERVAL);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut tick: u64 = 0;

            info!("Polling {} every {:?}", session.device, period);
            loop {
                tokio::select! {
                    biased;
                    // Fires on cancel and when the handle is dropped
                    _ = cancelled.changed() => break,
                    _ = ticker.tick() => {}
                }

                tick += 1;
                match session.poll_once().await {
                    Ok(state) => on_update(&state),
                    Err(e) => warn!(device = %session.device, tick, "Poll failed: {}", e),
                }
            }

            session.state_machine.write().await.stop_polling();
            debug!("Polling of {} stopped after {} tick(s)", session.device, tick);
        });

        Ok(PollingHandle { cancel, task })
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// Most recently reported state, `AwaitingSettings` before the first read
    pub fn latest(&self) -> OnboardingState {
        self.latest.borrow().clone()
    }

    /// Subscribe to reported state changes
    pub fn subscribe(&self) -> watch::Receiver<OnboardingState> {
        self.latest.subscribe()
    }

    pub async fn phase(&self) -> SessionPhase {
        let phase = self.state_machine.read().await.phase;
        if phase == SessionPhase::Polling && self.latest.borrow().is_terminal() {
            SessionPhase::Terminal
        } else {
            phase
        }
    }

    /// Number of undecodable status payloads seen so far
    pub fn malformed_payloads(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}

/// Handle to a running polling loop
#[derive(Debug)]
pub struct PollingHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollingHandle {
    /// Stop polling
    ///
    /// The timer stops immediately; a cycle already talking to the station is
    /// allowed to finish before this returns.
    pub async fn cancel(self) {
        let _ = self.cancel.send(true);
        if let Err(e) = self.task.await {
            warn!("Polling task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
