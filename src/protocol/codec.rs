//! JSON payloads exchanged over the provisioning service

use crate::core::{
    error::{CodecError, CodecResult},
    types::{OnboardingConfig, OnboardingState},
};

/// Encode a configuration record for the command characteristic
pub fn encode_config(config: &OnboardingConfig) -> CodecResult<Vec<u8>> {
    Ok(serde_json::to_vec(config)?)
}

/// Decode the status characteristic into an onboarding state
///
/// The `_type` field selects the variant. Payloads with a missing or unknown
/// discriminator, or without the variant's fields, are malformed.
pub fn decode_state(bytes: &[u8]) -> CodecResult<OnboardingState> {
    if bytes.is_empty() {
        return Err(CodecError::Malformed("empty payload".to_string()));
    }

    let text = std::str::from_utf8(bytes)
        .map_err(|e| CodecError::Malformed(format!("invalid UTF-8: {}", e)))?;

    serde_json::from_str(text).map_err(|e| CodecError::Malformed(e.to_string()))
}
