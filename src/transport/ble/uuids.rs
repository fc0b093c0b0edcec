//! GATT UUIDs of the station provisioning service
//!
//! These must match the station firmware exactly.

use uuid::Uuid;

/// Provisioning service UUID, advertised while a station accepts onboarding
pub const PROVISIONING_SERVICE_UUID: Uuid = Uuid::from_u128(0x00467768_6228_2272_4663_277478269000);

/// Status characteristic (read, JSON-encoded onboarding state)
pub const STATUS_CHAR_UUID: Uuid = Uuid::from_u128(0x00467768_6228_2272_4663_277478269001);

/// Command characteristic (write, JSON-encoded onboarding configuration)
pub const COMMAND_CHAR_UUID: Uuid = Uuid::from_u128(0x00467768_6228_2272_4663_277478269002);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        assert_eq!(
            PROVISIONING_SERVICE_UUID.to_string(),
            "00467768-6228-2272-4663-277478269000"
        );
        assert_eq!(
            STATUS_CHAR_UUID.to_string(),
            "00467768-6228-2272-4663-277478269001"
        );
        assert_eq!(
            COMMAND_CHAR_UUID.to_string(),
            "00467768-6228-2272-4663-277478269002"
        );
    }

    #[test]
    fn test_uuids_unique() {
        assert_ne!(PROVISIONING_SERVICE_UUID, STATUS_CHAR_UUID);
        assert_ne!(PROVISIONING_SERVICE_UUID, COMMAND_CHAR_UUID);
        assert_ne!(STATUS_CHAR_UUID, COMMAND_CHAR_UUID);
    }
}
