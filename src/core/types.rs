//! Domain types for station onboarding

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{OnboardingError, OnboardingResult};

/// Station firmware buffer sizes in UTF-8 bytes
pub const MAX_NAME_LEN: usize = 255;
pub const MAX_LOCATION_LEN: usize = 255;
pub const MAX_DESCRIPTION_LEN: usize = 255;
pub const MAX_WIFI_SSID_LEN: usize = 32;
pub const MAX_WIFI_PASSWORD_LEN: usize = 64;

/// Opaque identifier of a discovered peripheral
///
/// Stable for the lifetime of a scan or connection, but not across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration pushed to a station over the command characteristic
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct OnboardingConfig {
    pub name: String,
    pub location: String,
    pub description: String,
    pub wifi_ssid: String,
    pub wifi_password: String,
}

impl OnboardingConfig {
    /// Check every field is present and fits the station's buffers
    pub fn validate(&self) -> OnboardingResult<()> {
        check_field("name", &self.name, MAX_NAME_LEN)?;
        check_field("location", &self.location, MAX_LOCATION_LEN)?;
        check_field("description", &self.description, MAX_DESCRIPTION_LEN)?;
        check_field("wifi_ssid", &self.wifi_ssid, MAX_WIFI_SSID_LEN)?;
        check_field("wifi_password", &self.wifi_password, MAX_WIFI_PASSWORD_LEN)
    }
}

fn check_field(field: &'static str, value: &str, max_len: usize) -> OnboardingResult<()> {
    if value.trim().is_empty() {
        return Err(OnboardingError::InvalidConfig {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if value.len() > max_len {
        return Err(OnboardingError::InvalidConfig {
            field,
            reason: format!("{} bytes exceeds the limit of {}", value.len(), max_len),
        });
    }
    Ok(())
}

impl fmt::Debug for OnboardingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnboardingConfig")
            .field("name", &self.name)
            .field("location", &self.location)
            .field("description", &self.description)
            .field("wifi_ssid", &self.wifi_ssid)
            .field("wifi_password", &"<redacted>")
            .finish()
    }
}

/// Provisioning progress as reported by the station
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "_type")]
pub enum OnboardingState {
    #[default]
    AwaitingSettings,
    ProvisioningWifi,
    AwaitingAuthorization {
        url: String,
    },
    Complete,
    Failed {
        error: String,
    },
}

impl OnboardingState {
    /// No further progress is expected from the station
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OnboardingState::Complete | OnboardingState::Failed { .. }
        )
    }
}

impl fmt::Display for OnboardingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnboardingState::AwaitingSettings => f.write_str("waiting for settings"),
            OnboardingState::ProvisioningWifi => f.write_str("joining WiFi network"),
            OnboardingState::AwaitingAuthorization { url } => {
                write!(f, "waiting for authorization at {}", url)
            }
            OnboardingState::Complete => f.write_str("onboarding complete"),
            OnboardingState::Failed { error } => write!(f, "onboarding failed: {}", error),
        }
    }
}

/// Provisioning session phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Submitting,
    Submitted,
    Polling,
    /// Still polling, but the station reported a terminal state
    Terminal,
}
