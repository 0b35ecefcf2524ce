//! Device identity.

use core::fmt::{self, Write as _};

use heapless::String;

use super::error::Error;
use crate::network::HardwareAddress;

/// Longest identity accepted, in bytes.
pub const MAX_IDENTITY_LEN: usize = 64;

/// A stable identifier for the device.
///
/// Used as MQTT client id, as the `<deviceId>` part of every topic and as the
/// device entry identifier in discovery payloads. Always non-empty ASCII.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity(String<MAX_IDENTITY_LEN>);

impl DeviceIdentity {
    /// Use `id` verbatim.
    ///
    /// Fails with [`Error::InvalidIdentity`] if `id` is empty, not ASCII or
    /// longer than [`MAX_IDENTITY_LEN`].
    pub fn new(id: &str) -> Result<Self, Error> {
        if id.is_empty() || !id.is_ascii() {
            return Err(Error::InvalidIdentity);
        }
        String::try_from(id)
            .map(Self)
            .map_err(|_| Error::InvalidIdentity)
    }

    /// Derive an identity from a textual hardware address by removing the
    /// `:` and `-` separators. Case is preserved.
    ///
    /// ```rust
    /// use hamqtt::homeassistant::DeviceIdentity;
    ///
    /// let id = DeviceIdentity::from_hardware_address("AA:BB:CC:DD:EE:FF").unwrap();
    /// assert_eq!(id.as_str(), "AABBCCDDEEFF");
    /// ```
    pub fn from_hardware_address(address: &str) -> Result<Self, Error> {
        let mut id: String<MAX_IDENTITY_LEN> = String::new();
        for c in address.chars().filter(|c| !matches!(c, ':' | '-')) {
            id.push(c).map_err(|_| Error::InvalidIdentity)?;
        }
        Self::new(&id)
    }

    /// Pick the identity for a device: `explicit` when supplied and non-empty,
    /// otherwise the separator-free form of `address`.
    pub fn resolve(explicit: Option<&str>, address: HardwareAddress) -> Result<Self, Error> {
        match explicit {
            Some(id) if !id.is_empty() => Self::new(id),
            _ => {
                let mut text: String<17> = String::new();
                write!(text, "{}", address).map_err(|_| Error::InvalidIdentity)?;
                Self::from_hardware_address(&text)
            }
        }
    }

    /// The identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DeviceIdentity {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
