//! Wireless link layer abstraction

pub mod adapter;
pub mod ble;
#[cfg(test)]
pub mod mock_adapter;

pub use adapter::{DiscoverySink, TransportAdapter};

#[cfg(test)]
pub use mock_adapter::MockTransport;
