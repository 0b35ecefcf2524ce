//! Reconnectable [`BrokerTransport`] over an MQTT [`Client`].

use core::fmt::Write as _;

use heapless::String;

use super::client::{Client, Options, PublishPacket, QoS};
use super::{BrokerConfig, BrokerTransport};
use crate::network::Connect;
use crate::network::error::Error;

/// Room for `host:port`.
const MAX_REMOTE_LEN: usize = 96;

/// A broker transport that opens a fresh connection for every handshake.
///
/// The connector is kept for the lifetime of the transport; the client is
/// dropped whenever the session fails so that the next
/// [`connect`](BrokerTransport::connect) starts from a new socket.
pub struct MqttTransport<N: Connect> {
    connector: N,
    client: Option<Client<N::Connection>>,
}

impl<N: Connect> MqttTransport<N> {
    /// Create a disconnected transport using `connector` to open sockets.
    pub fn new(connector: N) -> Self {
        Self {
            connector,
            client: None,
        }
    }

    /// Send a keep-alive ping on the current session.
    pub fn ping(&mut self) -> Result<(), Error> {
        let result = self.client_mut()?.ping();
        self.drop_if_failed(result)
    }

    /// The live client, if a session is established.
    pub fn client(&self) -> Option<&Client<N::Connection>> {
        self.client.as_ref()
    }

    /// Get a mutable reference to the connector
    pub fn connector_mut(&mut self) -> &mut N {
        &mut self.connector
    }

    fn client_mut(&mut self) -> Result<&mut Client<N::Connection>, Error> {
        self.client.as_mut().ok_or(Error::NotOpen)
    }

    fn drop_if_failed<T>(&mut self, result: Result<T, Error>) -> Result<T, Error> {
        if self.client.as_ref().is_some_and(|c| !c.is_connected()) {
            self.client = None;
        }
        result
    }
}

impl<N: Connect> BrokerTransport for MqttTransport<N> {
    type Error = Error;

    fn connect(&mut self, broker: &BrokerConfig<'_>, client_id: &str) -> Result<(), Error> {
        self.client = None;

        let mut remote: String<MAX_REMOTE_LEN> = String::new();
        write!(remote, "{}:{}", broker.host, broker.port).map_err(|_| Error::InvalidAddress)?;

        let connection = self.connector.connect(&remote).map_err(|e| {
            warn!("tcp connect to {} failed: {:?}", remote.as_str(), e);
            Error::ConnectionRefused
        })?;

        let options = Options {
            client_id,
            keep_alive_seconds: broker.keep_alive_seconds,
            clean_session: true,
            username: broker.username,
            password: broker.password,
        };
        self.client = Some(Client::connect(connection, options)?);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Error> {
        match self.client.take() {
            Some(client) => client.disconnect(),
            None => Ok(()),
        }
    }

    fn is_connected(&self) -> bool {
        self.client.as_ref().is_some_and(Client::is_connected)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Error> {
        let result = self.client_mut()?.publish(topic, payload, QoS::AtMostOnce);
        self.drop_if_failed(result)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Error> {
        let result = self.client_mut()?.subscribe(topic, QoS::AtMostOnce);
        self.drop_if_failed(result)
    }

    fn poll(&mut self) -> Result<Option<PublishPacket>, Error> {
        let result = self.client_mut()?.poll();
        self.drop_if_failed(result)
    }

    /// An address or CONNECT packet that does not fit its buffer fails the
    /// same way every time.
    fn is_fatal(&self, error: &Error) -> bool {
        matches!(error, Error::InvalidAddress | Error::BufferOverflow)
    }
}

impl<N: Connect> core::fmt::Debug for MqttTransport<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
