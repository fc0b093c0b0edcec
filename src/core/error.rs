//! Error types for station onboarding

use thiserror::Error;
use uuid::Uuid;

use super::types::DeviceId;

/// Result type for transport adapter operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Result type for onboarding operations
pub type OnboardingResult<T> = Result<T, OnboardingError>;

/// Errors raised by the wireless link layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport not initialized")]
    NotInitialized,

    #[error("Bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("Scan failed: {0}")]
    Scan(String),

    #[error("Connecting to {device} failed: {reason}")]
    Connect { device: DeviceId, reason: String },

    #[error("Disconnecting from {device} failed: {reason}")]
    Disconnect { device: DeviceId, reason: String },

    #[error("Invalid device identifier: {0}")]
    InvalidDeviceId(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceId),

    #[error("Characteristic {characteristic} of service {service} not found")]
    CharacteristicNotFound { service: Uuid, characteristic: Uuid },

    #[error("Reading characteristic {characteristic} failed: {reason}")]
    Read { characteristic: Uuid, reason: String },

    #[error("Writing characteristic {characteristic} failed: {reason}")]
    Write { characteristic: Uuid, reason: String },

    #[error("Not connected to {0}")]
    NotConnected(DeviceId),
}

/// Errors raised while encoding or decoding onboarding payloads
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors surfaced to the onboarding caller
#[derive(Error, Debug)]
pub enum OnboardingError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Operation already in progress")]
    OperationInProgress,

    #[error("No station selected")]
    NoDeviceSelected,

    #[error("Invalid {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}
