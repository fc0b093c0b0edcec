//! Wire payloads of the provisioning service

pub mod codec;

pub use codec::{decode_state, encode_config};
