//! # Application Layer Network Protocols
//!
//! Application layer (OSI Layer 7) protocols implemented on top of the core
//! [`Connection`](crate::network::Connection) traits.
//!
//! ## Available Protocols
//!
//! - **[`mqtt`]**: MQTT 3.1.1 client and the [`BrokerTransport`](mqtt::BrokerTransport)
//!   abstraction the Home Assistant layer publishes through
//!
//! ## Design Principles
//!
//! - **Connection Agnostic**: Work with any type implementing [`Connection`](crate::network::Connection)
//! - **No-std Compatible**: Designed for embedded systems without heap allocation
//! - **Resource Conscious**: Use fixed-size buffers and minimal memory

/// MQTT client implementation.
///
/// Provides an MQTT 3.1.1 client for lightweight publish-subscribe messaging,
/// commonly used in IoT applications.
pub mod mqtt;
