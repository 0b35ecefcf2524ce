//! Network and broker bring-up.

use embedded_hal::delay::DelayNs;

use super::config::RetryPolicy;
use super::error::{Error, Stage};
use super::identity::DeviceIdentity;
use crate::network::WirelessLink;
use crate::network::application::mqtt::{BrokerConfig, BrokerTransport};

/// Where the connection bring-up currently stands.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConnectionState {
    /// Nothing is up, or the last bring-up gave up.
    Disconnected,
    /// A bring-up is in progress.
    Connecting,
    /// The broker handshake succeeded.
    Connected,
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConnectionState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConnectionState::Disconnected => defmt::write!(f, "Disconnected"),
            ConnectionState::Connecting => defmt::write!(f, "Connecting"),
            ConnectionState::Connected => defmt::write!(f, "Connected"),
        }
    }
}

/// Owns the wireless link and broker transport and brings both up with retry.
///
/// Both stages share one [`RetryPolicy`]. Each failed attempt is logged with
/// the driver's error and followed by the policy's delay.
#[derive(Debug)]
pub struct ConnectionManager<L, T, D> {
    link: L,
    transport: T,
    delay: D,
    retry: RetryPolicy,
    state: ConnectionState,
}

impl<L, T, D> ConnectionManager<L, T, D>
where
    L: WirelessLink,
    T: BrokerTransport,
    D: DelayNs,
{
    /// Create a manager in the [`Disconnected`](ConnectionState::Disconnected) state.
    pub fn new(link: L, transport: T, delay: D, retry: RetryPolicy) -> Self {
        Self {
            link,
            transport,
            delay,
            retry,
            state: ConnectionState::Disconnected,
        }
    }

    /// Join `ssid`, retrying until success or until the policy gives up.
    ///
    /// Returns the number of attempts it took.
    pub fn connect_network(&mut self, ssid: &str, password: &str) -> Result<u32, Error> {
        self.state = ConnectionState::Connecting;
        info!("connecting to network {}", ssid);

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.link.associate(ssid, password) {
                Ok(()) => {
                    info!("network {} joined after {} attempt(s)", ssid, attempts);
                    return Ok(attempts);
                }
                Err(e) => {
                    warn!("joining {} failed: {:?}", ssid, e);
                    self.back_off(Stage::Network, attempts)?;
                }
            }
        }
    }

    /// Perform the broker handshake as `identity`, retrying like
    /// [`connect_network`](Self::connect_network).
    ///
    /// Enters [`Connected`](ConnectionState::Connected) on success. An error
    /// the transport reports as [fatal](BrokerTransport::is_fatal) ends the
    /// bring-up at once with [`Error::InvalidConfig`].
    pub fn connect_broker(
        &mut self,
        broker: &BrokerConfig<'_>,
        identity: &DeviceIdentity,
    ) -> Result<u32, Error> {
        self.state = ConnectionState::Connecting;

        let mut attempts = 0;
        loop {
            attempts += 1;
            info!(
                "client {} connecting to broker {}:{}",
                identity, broker.host, broker.port
            );
            match self.transport.connect(broker, identity.as_str()) {
                Ok(()) => {
                    info!("connected to broker {}:{}", broker.host, broker.port);
                    self.state = ConnectionState::Connected;
                    return Ok(attempts);
                }
                Err(e) if self.transport.is_fatal(&e) => {
                    error!("broker connection cannot succeed: {:?}", e);
                    self.state = ConnectionState::Disconnected;
                    return Err(Error::InvalidConfig);
                }
                Err(e) => {
                    warn!("broker connection failed, rc={:?}", e);
                    self.back_off(Stage::Broker, attempts)?;
                }
            }
        }
    }

    /// Identity for this device: `explicit` if non-empty, otherwise derived
    /// from the link's hardware address.
    pub fn resolve_identity(&self, explicit: Option<&str>) -> Result<DeviceIdentity, Error> {
        DeviceIdentity::resolve(explicit, self.link.hardware_address())
    }

    /// Close the broker session, then leave the network.
    ///
    /// Driver errors are logged; the state is `Disconnected` afterwards.
    pub fn disconnect(&mut self) {
        if let Err(e) = self.transport.disconnect() {
            warn!("broker disconnect failed: {:?}", e);
        }
        if let Err(e) = self.link.disassociate() {
            warn!("network disassociate failed: {:?}", e);
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Record that the session was lost outside of a bring-up.
    pub fn mark_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Retry policy in use
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Get a reference to the wireless link
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Get a mutable reference to the wireless link
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Get a reference to the delay provider
    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Get a reference to the broker transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the broker transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn back_off(&mut self, stage: Stage, attempts: u32) -> Result<(), Error> {
        if !self.retry.allows_another(attempts) {
            error!("giving up on {} after {} attempts", stage, attempts);
            self.state = ConnectionState::Disconnected;
            return Err(Error::RetriesExhausted { stage, attempts });
        }
        self.delay.delay_ms(self.retry.delay_for_attempt(attempts));
        Ok(())
    }
}
