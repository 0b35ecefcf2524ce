//! # hamqtt - Home Assistant MQTT discovery for embedded devices
//!
//! Brings a resource-constrained device onto a Home Assistant installation
//! over MQTT: join the wireless network, connect to the broker, announce
//! entities through MQTT discovery, publish their state and route inbound
//! values to handlers.
//!
//! The crate is `no_std` and allocation-free. All strings and buffers are
//! [`heapless`] with fixed capacities.
//!
//! ## Layers
//!
//! - [`network`]: the traits a platform implements (byte connections, a
//!   connector, a [`WirelessLink`](network::WirelessLink)) and an MQTT 3.1.1
//!   client with a reconnectable [`BrokerTransport`](network::application::mqtt::BrokerTransport).
//! - [`homeassistant`]: identity, topics, discovery and state payloads, the
//!   callback registry and the [`DeviceSession`](homeassistant::DeviceSession)
//!   tying them together.
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! hamqtt = "0.1.0"
//! ```
//!
//! ### Topics and payloads
//!
//! ```rust
//! use hamqtt::homeassistant::{DeviceIdentity, Flow, state_payload, state_topic};
//!
//! let identity = DeviceIdentity::from_hardware_address("AA:BB:CC:DD:EE:FF").unwrap();
//! let topic = state_topic(&identity, "temp", Flow::Out).unwrap();
//! assert_eq!(topic, "homeassistant/sensor/out/AABBCCDDEEFF_temp/state");
//!
//! let mut buf = [0u8; 32];
//! let len = state_payload("temp", "21.5", &mut buf).unwrap();
//! assert_eq!(&buf[..len], br#"{"temp":"21.5"}"#);
//! ```
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support (default: disabled)
//! - `log`: Emit diagnostics through the `log` facade
//! - `defmt`: Enable defmt formatting of error and state types

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

#[macro_use]
mod fmt;

/// Network abstraction layer: connection traits, the wireless link and MQTT.
pub mod network;

/// Home Assistant discovery, state publishing and inbound routing.
pub mod homeassistant;
