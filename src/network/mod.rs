//! A network abstraction layer for embedded systems
//!
//! This module provides the traits the crate talks to the outside world
//! through: byte-stream connections and connectors for the broker transport,
//! and the [`WirelessLink`] the device joins before anything else can happen.
//! Platform crates implement these on top of their socket and radio drivers.

#![deny(unsafe_code)]

/// Common error types for network operations
pub mod error;

/// Wireless network interface abstraction.
pub mod link;

/// Application layer protocols built on the connection traits.
pub mod application;

pub use link::{HardwareAddress, WirelessLink};

/// Re-exports of common traits
pub mod prelude {
    pub use super::application::mqtt::BrokerTransport;
    pub use super::link::WirelessLink;
    pub use super::{Close, Connect, Connection, Read, Write};
}

/// A readable byte stream.
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read data from the connection.
    ///
    /// Returns `Ok(0)` when no data is available right now. Implementations
    /// should wait briefly (a socket read timeout, for example) before giving
    /// up. The end of the stream is reported as an error, not as `Ok(0)`.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// A writable byte stream.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the connection
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// A byte stream that can be shut down.
pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// A synchronous connection
pub trait Connection: Read + Write + Close {}

/// A synchronous connector (client)
pub trait Connect {
    /// Associated connection type
    type Connection: Connection;
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Open a connection to `remote`, given as `host:port`.
    fn connect(&mut self, remote: &str) -> Result<Self::Connection, Self::Error>;
}
