//! Onboarding flow controller
//!
//! Binds station discovery, station selection, configuration submission and
//! status polling into one flow. Exactly one onboarding session exists at a time.

use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    backend::StationDirectory,
    core::{
        error::{OnboardingError, OnboardingResult},
        scanner::DiscoveryScanner,
        session::{PollingHandle, ProvisioningSession},
        types::{DeviceId, OnboardingConfig, OnboardingState, SessionPhase},
    },
    transport::TransportAdapter,
};

/// What the onboarding view should currently show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingView {
    /// No station chosen yet
    Discovering { candidates: Vec<DeviceId> },
    /// A station was chosen; showing its reported progress
    Provisioning {
        device: DeviceId,
        phase: SessionPhase,
        state: OnboardingState,
    },
}

/// Composition root of the onboarding flow
pub struct OnboardingController<T: TransportAdapter, S: StationDirectory> {
    transport: Arc<T>,
    stations: Arc<S>,
    scanner: DiscoveryScanner<T>,
    poll_interval: Duration,
    selected: Option<DeviceId>,
    session: Option<ProvisioningSession<T>>,
    polling: Option<PollingHandle>,
}

impl<T: TransportAdapter, S: StationDirectory> OnboardingController<T, S> {
    pub fn new(transport: Arc<T>, stations: Arc<S>, poll_interval: Duration) -> Self {
        Self {
            scanner: DiscoveryScanner::new(transport.clone()),
            transport,
            stations,
            poll_interval,
            selected: None,
            session: None,
            polling: None,
        }
    }

    /// Start looking for stations, or subscribe to the running scan
    pub async fn begin_discovery(&self) -> OnboardingResult<watch::Receiver<Vec<DeviceId>>> {
        Ok(self.scanner.start().await?)
    }

    /// Choose the station to onboard
    ///
    /// Ends discovery once all pending discoveries have been recorded.
    pub async fn select_device(&mut self, device: DeviceId) -> OnboardingResult<()> {
        if self.session.is_some() {
            return Err(OnboardingError::OperationInProgress);
        }

        self.scanner.stop().await?;
        info!("Selected station {}", device);
        self.selected = Some(device);
        Ok(())
    }

    /// Push the configuration to the selected station and follow its progress
    ///
    /// The station list is invalidated once, when the station first reports
    /// `Complete`. A failed push leaves no session behind; the caller may retry.
    pub async fn submit(&mut self, config: OnboardingConfig) -> OnboardingResult<DeviceId> {
        if self.session.is_some() {
            return Err(OnboardingError::OperationInProgress);
        }
        let device = self
            .selected
            .clone()
            .ok_or(OnboardingError::NoDeviceSelected)?;
        config.validate()?;

        let session = ProvisioningSession::new(self.transport.clone(), device);
        let device = session.submit(&config).await?;

        let stations = self.stations.clone();
        let mut invalidated = false;
        let polling = session
            .start_polling(self.poll_interval, move |state| {
                if *state == OnboardingState::Complete && !invalidated {
                    invalidated = true;
                    stations.invalidate_stations();
                }
            })
            .await?;

        self.session = Some(session);
        self.polling = Some(polling);
        Ok(device)
    }

    /// Reported state changes of the active session
    pub fn updates(&self) -> Option<watch::Receiver<OnboardingState>> {
        self.session.as_ref().map(ProvisioningSession::subscribe)
    }

    pub fn selected(&self) -> Option<&DeviceId> {
        self.selected.as_ref()
    }

    /// Current view, depending on whether a station has been chosen
    pub async fn view(&self) -> OnboardingView {
        match (&self.session, &self.selected) {
            (Some(session), _) => OnboardingView::Provisioning {
                device: session.device().clone(),
                phase: session.phase().await,
                state: session.latest(),
            },
            (None, Some(device)) => OnboardingView::Provisioning {
                device: device.clone(),
                phase: SessionPhase::Idle,
                state: OnboardingState::default(),
            },
            (None, None) => OnboardingView::Discovering {
                candidates: self.scanner.candidates(),
            },
        }
    }

    /// Tear the flow down
    ///
    /// Polling stops after its in-flight cycle and discovery is stopped.
    pub async fn cancel(&mut self) -> OnboardingResult<()> {
        if let Some(polling) = self.polling.take() {
            polling.cancel().await;
        }
        if let Some(session) = self.session.take() {
            info!("Onboarding of {} cancelled", session.device());
        }
        self.selected = None;

        if let Err(e) = self.scanner.stop().await {
            warn!("Stopping discovery failed: {}", e);
            return Err(e.into());
        }
        Ok(())
    }
}
