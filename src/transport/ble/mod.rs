//! Bluetooth Low Energy transport

pub mod adapter;
pub mod uuids;

pub use {adapter::BleTransport, uuids::*};
