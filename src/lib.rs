//! Mycelium station onboarding
//!
//! Pairs a new plant-monitoring station over Bluetooth Low Energy, pushes its
//! configuration and follows its provisioning progress:
//! - Station discovery by provisioning service
//! - Configuration push over the command characteristic
//! - Status polling over the status characteristic

pub mod backend;
pub mod config;
pub mod core;
pub mod protocol;
pub mod transport;

pub use core::{
    controller::{OnboardingController, OnboardingView},
    error::{CodecError, OnboardingError, TransportError},
    types::{DeviceId, OnboardingConfig, OnboardingState, SessionPhase},
};
