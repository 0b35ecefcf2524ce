//! The per-device session.

use embedded_hal::delay::DelayNs;

use super::config::DeviceConfig;
use super::connection::{ConnectionManager, ConnectionState};
use super::discovery::DiscoveryPublisher;
use super::dispatcher::MessageDispatcher;
use super::entity::EntityDescriptor;
use super::error::Error;
use super::identity::DeviceIdentity;
use super::registry::{CallbackRegistry, DEFAULT_CAPACITY, TopicHandler};
use super::state::StatePublisher;
use super::topic::EntityTopics;
use crate::network::WirelessLink;
use crate::network::application::mqtt::BrokerTransport;

/// One device talking to Home Assistant.
///
/// Owns the connection, the device identity and up to `N` inbound
/// registrations. The identity is fixed when the session is created.
///
/// A typical firmware loop:
///
/// ```rust,ignore
/// let mut session = DeviceSession::new(CONFIG, wifi, MqttTransport::new(tcp), delay)?;
/// session.connect()?;
/// session.register_endpoint(&SETPOINT, setpoint_handler)?;
/// session.register_output(&TEMPERATURE)?;
///
/// loop {
///     session.service();
///     session.publish_state("temp", &reading)?;
/// }
/// ```
#[derive(Debug)]
pub struct DeviceSession<'a, L, T, D, H, const N: usize = DEFAULT_CAPACITY> {
    config: DeviceConfig<'a>,
    connection: ConnectionManager<L, T, D>,
    identity: DeviceIdentity,
    registry: CallbackRegistry<H, N>,
}

impl<'a, L, T, D, H, const N: usize> DeviceSession<'a, L, T, D, H, N>
where
    L: WirelessLink,
    T: BrokerTransport,
    D: DelayNs,
    H: TopicHandler,
{
    /// Create a disconnected session and resolve the device identity.
    pub fn new(config: DeviceConfig<'a>, link: L, transport: T, delay: D) -> Result<Self, Error> {
        let connection = ConnectionManager::new(link, transport, delay, config.retry);
        let identity = connection.resolve_identity(config.device_id)?;
        info!("device identity {}", identity);

        Ok(Self {
            config,
            connection,
            identity,
            registry: CallbackRegistry::new(),
        })
    }

    /// Join the network, then connect to the broker.
    pub fn connect(&mut self) -> Result<(), Error> {
        let network = self.config.network;
        self.connection
            .connect_network(network.ssid, network.password)?;
        self.connection
            .connect_broker(&self.config.broker, &self.identity)?;
        Ok(())
    }

    /// Bring the session back after a loss.
    ///
    /// Rejoins the network only if the link dropped, reconnects to the broker
    /// and renews every subscription held by the registry.
    pub fn reconnect(&mut self) -> Result<(), Error> {
        if !self.connection.link().is_associated() {
            let network = self.config.network;
            self.connection
                .connect_network(network.ssid, network.password)?;
        }
        self.connection
            .connect_broker(&self.config.broker, &self.identity)?;

        let transport = self.connection.transport_mut();
        for topic in self.registry.topics() {
            if let Err(e) = transport.subscribe(topic) {
                warn!("resubscribe to {} failed: {:?}", topic, e);
            }
        }
        Ok(())
    }

    /// Announce `descriptor` and, for inbound flows, route its state topic to
    /// `handler`. See [`DiscoveryPublisher::register_endpoint`].
    pub fn register_endpoint(
        &mut self,
        descriptor: &EntityDescriptor<'_>,
        handler: H,
    ) -> Result<(), Error> {
        DiscoveryPublisher::new(self.connection.transport_mut()).register_endpoint(
            &self.identity,
            descriptor,
            handler,
            &mut self.registry,
        )
    }

    /// Announce an outbound-only entity.
    pub fn register_output(
        &mut self,
        descriptor: &EntityDescriptor<'_>,
    ) -> Result<EntityTopics, Error> {
        DiscoveryPublisher::new(self.connection.transport_mut())
            .register_output(&self.identity, descriptor)
    }

    /// Publish a value for entity `code`.
    pub fn publish_state(&mut self, code: &str, value: &str) -> Result<(), Error> {
        StatePublisher::new(self.connection.transport_mut()).publish(&self.identity, code, value)
    }

    /// Poll the transport once and dispatch the message it returned, if any.
    ///
    /// Returns whether a handler ran. A poll error that leaves the transport
    /// connected only drops the offending message. Otherwise the session is
    /// marked disconnected; call [`reconnect`](Self::reconnect) to recover.
    pub fn service(&mut self) -> bool {
        match self.connection.transport_mut().poll() {
            Ok(Some(packet)) => {
                MessageDispatcher::new(&mut self.registry).on_message(&packet.topic, &packet.payload)
            }
            Ok(None) => false,
            Err(e) if self.connection.transport().is_connected() => {
                warn!("dropping inbound message: {:?}", e);
                false
            }
            Err(e) => {
                warn!("broker poll failed: {:?}", e);
                self.connection.mark_disconnected();
                false
            }
        }
    }

    /// Close the broker session and leave the network.
    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Whether the broker session is up.
    pub fn is_connected(&self) -> bool {
        self.connection.state() == ConnectionState::Connected
            && self.connection.transport().is_connected()
    }

    /// The device identity.
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// The configuration the session was created with.
    pub fn config(&self) -> &DeviceConfig<'a> {
        &self.config
    }

    /// Inbound registrations.
    pub fn registry(&self) -> &CallbackRegistry<H, N> {
        &self.registry
    }

    /// Get a reference to the connection manager
    pub fn connection(&self) -> &ConnectionManager<L, T, D> {
        &self.connection
    }

    /// Get a mutable reference to the connection manager
    pub fn connection_mut(&mut self) -> &mut ConnectionManager<L, T, D> {
        &mut self.connection
    }
}
