use crate::{
    Result,
    constants::{MAX_LOCATION_ID_LENGTH, MIN_LOCATION_ID_LENGTH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hardware class of a card reader.
///
/// Built-in readers run on the merchant's own device (tap-to-pay on the
/// phone that hosts the app); external readers are standalone Bluetooth
/// accessories. The class decides which discovery process finds the reader
/// and which connection configuration is used to connect to it — the only
/// two places that are allowed to branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Reader integrated into the host device (COTS / tap-to-pay).
    BuiltIn,

    /// External Bluetooth reader accessory.
    External,
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::BuiltIn => write!(f, "built-in"),
            DeviceClass::External => write!(f, "external"),
        }
    }
}

/// Known card reader hardware models.
///
/// The model name is the stable identity the hardware SDK reports for a
/// discovered reader and the string discovery filters match against. Models
/// the SDK reports that this crate does not know yet are carried through as
/// [`ReaderModel::Unknown`] rather than dropped, so discovery results stay
/// complete when new hardware ships.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ReaderModel {
    /// BBPOS Chipper 2X BT external reader.
    Chipper2X,

    /// BBPOS WisePad 3 external reader.
    WisePad3,

    /// Stripe Reader M2 external reader.
    StripeM2,

    /// Built-in reader of the host device.
    CotsDevice,

    /// Model reported by the SDK but not known to this crate.
    Unknown(String),
}

impl ReaderModel {
    /// Stable model name, as reported by the hardware SDK.
    ///
    /// # Examples
    ///
    /// ```
    /// use cardlink_core::ReaderModel;
    ///
    /// assert_eq!(ReaderModel::Chipper2X.name(), "CHIPPER_2X");
    /// assert_eq!(ReaderModel::CotsDevice.name(), "COTS_DEVICE");
    /// ```
    pub fn name(&self) -> &str {
        match self {
            ReaderModel::Chipper2X => "CHIPPER_2X",
            ReaderModel::WisePad3 => "WISEPAD_3",
            ReaderModel::StripeM2 => "STRIPE_M2",
            ReaderModel::CotsDevice => "COTS_DEVICE",
            ReaderModel::Unknown(name) => name,
        }
    }

    /// Hardware class this model belongs to.
    ///
    /// Unknown models are treated as external accessories: every built-in
    /// reader variant is known ahead of time because it ships with the app,
    /// while new external hardware appears in the field first.
    pub fn device_class(&self) -> DeviceClass {
        match self {
            ReaderModel::CotsDevice => DeviceClass::BuiltIn,
            ReaderModel::Chipper2X
            | ReaderModel::WisePad3
            | ReaderModel::StripeM2
            | ReaderModel::Unknown(_) => DeviceClass::External,
        }
    }

    /// Parse a model from its SDK name.
    ///
    /// Never fails; unrecognized names become [`ReaderModel::Unknown`].
    ///
    /// # Examples
    ///
    /// ```
    /// use cardlink_core::ReaderModel;
    ///
    /// assert_eq!(ReaderModel::from_name("WISEPAD_3"), ReaderModel::WisePad3);
    /// assert_eq!(
    ///     ReaderModel::from_name("FUTURE_READER"),
    ///     ReaderModel::Unknown("FUTURE_READER".to_string())
    /// );
    /// ```
    pub fn from_name(name: &str) -> Self {
        match name {
            "CHIPPER_2X" => ReaderModel::Chipper2X,
            "WISEPAD_3" => ReaderModel::WisePad3,
            "STRIPE_M2" => ReaderModel::StripeM2,
            "COTS_DEVICE" => ReaderModel::CotsDevice,
            other => ReaderModel::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ReaderModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Identifier of the business location a reader connection is registered to.
///
/// The hardware SDK requires every connection to be bound to a location so
/// the platform can attribute the reader to a physical store. The id is an
/// opaque token issued by the backend; this type only guarantees it is
/// well-formed (trimmed, ASCII, 1-64 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationId(String);

impl LocationId {
    /// Create a new location id with validation.
    ///
    /// The value is trimmed before validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidLocationId` if:
    /// - The trimmed value is empty or longer than 64 characters
    /// - The value contains non-ASCII characters
    ///
    /// # Examples
    ///
    /// ```
    /// use cardlink_core::LocationId;
    ///
    /// let location = LocationId::new("loc_D2PnsNMVW3kdSE").unwrap();
    /// assert_eq!(location.as_str(), "loc_D2PnsNMVW3kdSE");
    ///
    /// assert!(LocationId::new("  ").is_err());
    /// ```
    pub fn new(id: &str) -> Result<Self> {
        let id = id.trim();

        let len = id.len();
        if !(MIN_LOCATION_ID_LENGTH..=MAX_LOCATION_ID_LENGTH).contains(&len) {
            return Err(Error::InvalidLocationId(format!(
                "Location id must be {MIN_LOCATION_ID_LENGTH}-{MAX_LOCATION_ID_LENGTH} chars, got {len}"
            )));
        }

        if !id.is_ascii() {
            return Err(Error::InvalidLocationId(
                "Location id must be ASCII".to_string(),
            ));
        }

        Ok(LocationId(id.to_string()))
    }

    /// Get the location id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for LocationId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        LocationId::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_device_class_display() {
        assert_eq!(DeviceClass::BuiltIn.to_string(), "built-in");
        assert_eq!(DeviceClass::External.to_string(), "external");
    }

    #[rstest]
    #[case(ReaderModel::Chipper2X, "CHIPPER_2X", DeviceClass::External)]
    #[case(ReaderModel::WisePad3, "WISEPAD_3", DeviceClass::External)]
    #[case(ReaderModel::StripeM2, "STRIPE_M2", DeviceClass::External)]
    #[case(ReaderModel::CotsDevice, "COTS_DEVICE", DeviceClass::BuiltIn)]
    fn test_reader_model_name_and_class(
        #[case] model: ReaderModel,
        #[case] name: &str,
        #[case] class: DeviceClass,
    ) {
        assert_eq!(model.name(), name);
        assert_eq!(model.device_class(), class);
        assert_eq!(ReaderModel::from_name(name), model);
    }

    #[test]
    fn test_reader_model_unknown_round_trip() {
        let model = ReaderModel::from_name("FUTURE_READER");
        assert_eq!(model, ReaderModel::Unknown("FUTURE_READER".to_string()));
        assert_eq!(model.name(), "FUTURE_READER");
        assert_eq!(model.device_class(), DeviceClass::External);
    }

    #[test]
    fn test_location_id_valid() {
        let location = LocationId::new("loc_D2PnsNMVW3kdSE").unwrap();
        assert_eq!(location.as_str(), "loc_D2PnsNMVW3kdSE");
        assert_eq!(location.to_string(), "loc_D2PnsNMVW3kdSE");
    }

    #[test]
    fn test_location_id_trims_whitespace() {
        let location = LocationId::new("  loc_1  ").unwrap();
        assert_eq!(location.as_str(), "loc_1");
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("localização")]
    fn test_location_id_invalid(#[case] raw: &str) {
        assert!(LocationId::new(raw).is_err());
    }

    #[test]
    fn test_location_id_max_length() {
        let max = "a".repeat(MAX_LOCATION_ID_LENGTH);
        assert!(LocationId::new(&max).is_ok());

        let too_long = "a".repeat(MAX_LOCATION_ID_LENGTH + 1);
        assert!(LocationId::new(&too_long).is_err());
    }

    #[test]
    fn test_location_id_from_str() {
        let location: LocationId = "loc_42".parse().unwrap();
        assert_eq!(location.as_str(), "loc_42");

        let result: std::result::Result<LocationId, _> = "".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_reader_model_serialization() {
        let model = ReaderModel::WisePad3;
        let json = serde_json::to_string(&model).unwrap();
        let deserialized: ReaderModel = serde_json::from_str(&json).unwrap();
        assert_eq!(model, deserialized);
    }
}
