//! MQTT 3.1.1 protocol support for embedded systems.
//!
//! This module contains two layers:
//!
//! - [`client`]: a wire-level MQTT 3.1.1 [`Client`] over any
//!   [`Connection`](crate::network::Connection).
//! - [`transport`]: [`MqttTransport`], which owns a connector plus an optional
//!   live client and implements [`BrokerTransport`] with reconnect support.
//!
//! The Home Assistant layer only depends on the [`BrokerTransport`] trait, so
//! any other MQTT stack can be plugged in by implementing it.

use serde::Deserialize;

/// MQTT client implementation and supporting types.
pub mod client;

/// [`BrokerTransport`] implementation on top of [`client::Client`].
pub mod transport;

pub use client::{
    Client, Options, PublishPacket, QoS, MAX_IDLE_READS, MAX_PAYLOAD_LEN, MAX_TOPIC_LEN,
};
pub use transport::MqttTransport;

/// Default MQTT port.
pub const DEFAULT_PORT: u16 = 1883;

/// Default keep-alive interval in seconds.
pub const DEFAULT_KEEP_ALIVE_SECONDS: u16 = 60;

/// Where and how to reach the broker.
///
/// Credentials are passed through to the CONNECT packet unchanged.
///
/// ```rust
/// use hamqtt::network::application::mqtt::BrokerConfig;
///
/// let broker = BrokerConfig::new("192.168.1.10", 1883).with_credentials("mqtt", "secret");
/// assert_eq!(broker.username, Some("mqtt"));
/// assert_eq!(broker.keep_alive_seconds, 60);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BrokerConfig<'a> {
    /// Broker host name or address.
    pub host: &'a str,
    /// Broker TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Optional user name.
    #[serde(default, borrow)]
    pub username: Option<&'a str>,
    /// Optional password.
    #[serde(default, borrow)]
    pub password: Option<&'a str>,
    /// Keep-alive interval announced in CONNECT.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_seconds: u16,
}

impl<'a> BrokerConfig<'a> {
    /// Broker at `host:port` without credentials.
    pub const fn new(host: &'a str, port: u16) -> Self {
        Self {
            host,
            port,
            username: None,
            password: None,
            keep_alive_seconds: DEFAULT_KEEP_ALIVE_SECONDS,
        }
    }

    /// Set user name and password
    #[must_use]
    pub const fn with_credentials(mut self, username: &'a str, password: &'a str) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    /// Set the keep-alive interval
    #[must_use]
    pub const fn with_keep_alive(mut self, seconds: u16) -> Self {
        self.keep_alive_seconds = seconds;
        self
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_keep_alive() -> u16 {
    DEFAULT_KEEP_ALIVE_SECONDS
}

/// The broker session primitives the device core is built on.
///
/// All traffic is fire-and-forget: a successful `publish` only means the
/// packet was handed to the network.
pub trait BrokerTransport {
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Perform one connect handshake with `broker`, identifying as `client_id`.
    fn connect(&mut self, broker: &BrokerConfig<'_>, client_id: &str) -> Result<(), Self::Error>;

    /// End the session, if any.
    fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Whether a session is currently established.
    fn is_connected(&self) -> bool;

    /// Publish `payload` on `topic`.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error>;

    /// Subscribe the session to `topic`.
    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Service the session once and return the next inbound message, if any.
    fn poll(&mut self) -> Result<Option<PublishPacket>, Self::Error>;

    /// Whether `error` from [`connect`](BrokerTransport::connect) would come
    /// back on every attempt, such as credentials too long to encode.
    /// Such errors are not retried.
    fn is_fatal(&self, _error: &Self::Error) -> bool {
        false
    }
}

impl<T: BrokerTransport + ?Sized> BrokerTransport for &mut T {
    type Error = T::Error;

    fn connect(&mut self, broker: &BrokerConfig<'_>, client_id: &str) -> Result<(), Self::Error> {
        (**self).connect(broker, client_id)
    }

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        (**self).disconnect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
        (**self).publish(topic, payload)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        (**self).subscribe(topic)
    }

    fn poll(&mut self) -> Result<Option<PublishPacket>, Self::Error> {
        (**self).poll()
    }

    fn is_fatal(&self, error: &Self::Error) -> bool {
        (**self).is_fatal(error)
    }
}
