//! Wireless network interface abstraction.

use core::fmt;

/// A 48-bit hardware (MAC) address of a network interface.
///
/// Displays as six upper-case hex octets separated by colons,
/// e.g. `AA:BB:CC:DD:EE:FF`.
///
/// ```rust
/// use hamqtt::network::HardwareAddress;
///
/// let mac = HardwareAddress([0xaa, 0xbb, 0xcc, 0x01, 0x02, 0x03]);
/// assert_eq!(format!("{}", mac), "AA:BB:CC:01:02:03");
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct HardwareAddress(pub [u8; 6]);

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

/// A wireless station interface.
///
/// Implemented by the platform's radio driver. The connection manager calls
/// [`associate`](WirelessLink::associate) once per attempt and retries on
/// error, so an implementation should make a single bounded attempt rather
/// than loop internally.
pub trait WirelessLink {
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Join the network `ssid` using `password`.
    fn associate(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    /// Leave the current network.
    fn disassociate(&mut self) -> Result<(), Self::Error>;

    /// Whether the link is currently up.
    fn is_associated(&self) -> bool;

    /// The interface's hardware address.
    fn hardware_address(&self) -> HardwareAddress;
}
