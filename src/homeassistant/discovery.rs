//! Discovery messages
//!
//! For every entity flow a config message is published to `.../config` at
//! QoS 0 without the retain flag, announcing the matching state topic to
//! Home Assistant.
//! Inbound flows additionally subscribe to their state topic and attach the
//! caller's handler to it.

use core::fmt::Write as _;

use heapless::{String, Vec};
use serde::Serialize;

use super::entity::{EntityDescriptor, Flow};
use super::error::Error;
use super::identity::{DeviceIdentity, MAX_IDENTITY_LEN};
use super::registry::{CallbackRegistry, TopicHandler};
use super::topic::{self, EntityTopics};
use crate::network::application::mqtt::BrokerTransport;

/// Discovery payload buffer size
pub const MAX_DISCOVERY_LEN: usize = 512;

const MAX_UNIQUE_ID_LEN: usize = MAX_IDENTITY_LEN + 72;
const MAX_NAME_LEN: usize = 72;
const MAX_TEMPLATE_LEN: usize = 96;

#[derive(Serialize)]
struct DeviceInfo<'a> {
    identifiers: &'a [&'a str],
    name: &'a str,
}

#[derive(Serialize)]
struct SensorDiscovery<'a> {
    device_class: &'a str,
    unit_of_measurement: &'a str,
    value_template: &'a str,
    state_topic: &'a str,
    unique_id: &'a str,
    name: &'a str,
    device: DeviceInfo<'a>,
}

/// Serialize the discovery payload of one entity flow into `buf`.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// * [`Error::TopicTooLong`] - The state topic does not fit
/// * [`Error::PayloadTooLarge`] - A field or the whole document does not fit
pub fn discovery_payload(
    identity: &DeviceIdentity,
    descriptor: &EntityDescriptor<'_>,
    flow: Flow,
    buf: &mut [u8],
) -> Result<usize, Error> {
    let state_topic = topic::state_topic(identity, descriptor.code, flow)?;
    let unique_id: String<MAX_UNIQUE_ID_LEN> = topic::unique_id(identity, descriptor.code, flow)?;

    let mut value_template: String<MAX_TEMPLATE_LEN> = String::new();
    write!(value_template, "{{{{ value_json.{} }}}}", descriptor.code)
        .map_err(|_| Error::PayloadTooLarge)?;

    let mut name: String<MAX_NAME_LEN> = String::new();
    write!(name, "{}{}", descriptor.name, flow.name_suffix()).map_err(|_| Error::PayloadTooLarge)?;

    let identifiers = [identity.as_str()];
    let payload = SensorDiscovery {
        device_class: descriptor.device_class,
        unit_of_measurement: descriptor.unit_of_measurement,
        value_template: &value_template,
        state_topic: &state_topic,
        unique_id: &unique_id,
        name: &name,
        device: DeviceInfo {
            identifiers: &identifiers,
            name: identity.as_str(),
        },
    };

    serde_json_core::to_slice(&payload, buf).map_err(|_| Error::PayloadTooLarge)
}

/// Topics and serialized payload of one flow, ready to send.
struct Announcement {
    topics: EntityTopics,
    payload: Vec<u8, MAX_DISCOVERY_LEN>,
}

impl Announcement {
    fn prepare(
        identity: &DeviceIdentity,
        descriptor: &EntityDescriptor<'_>,
        flow: Flow,
    ) -> Result<Self, Error> {
        let topics = EntityTopics::new(identity, descriptor.code, flow)?;
        let mut buf = [0u8; MAX_DISCOVERY_LEN];
        let len = discovery_payload(identity, descriptor, flow, &mut buf)?;
        let payload = Vec::from_slice(&buf[..len]).map_err(|_| Error::PayloadTooLarge)?;
        Ok(Self { topics, payload })
    }
}

/// Publishes discovery messages through a borrowed transport.
#[derive(Debug)]
pub struct DiscoveryPublisher<'t, T> {
    transport: &'t mut T,
}

impl<'t, T: BrokerTransport> DiscoveryPublisher<'t, T> {
    /// Publish through `transport`.
    pub fn new(transport: &'t mut T) -> Self {
        Self { transport }
    }

    /// Publish the discovery message of one flow and return its topics.
    ///
    /// A transport failure is logged, not returned.
    pub fn announce(
        &mut self,
        identity: &DeviceIdentity,
        descriptor: &EntityDescriptor<'_>,
        flow: Flow,
    ) -> Result<EntityTopics, Error> {
        let announcement = Announcement::prepare(identity, descriptor, flow)?;
        self.send(&announcement);
        Ok(announcement.topics)
    }

    /// Announce every flow of `descriptor`, In before Out.
    ///
    /// The inbound flow also subscribes to its state topic and registers
    /// `handler` for it. `handler` is dropped for outbound-only entities.
    ///
    /// Topics, payloads and registry room are checked before anything is
    /// sent, so on error nothing has been published and the registry is
    /// unchanged.
    pub fn register_endpoint<H: TopicHandler, const N: usize>(
        &mut self,
        identity: &DeviceIdentity,
        descriptor: &EntityDescriptor<'_>,
        handler: H,
        registry: &mut CallbackRegistry<H, N>,
    ) -> Result<(), Error> {
        let inbound = if descriptor.direction.includes_in() {
            if registry.is_full() {
                return Err(Error::CapacityExceeded);
            }
            Some(Announcement::prepare(identity, descriptor, Flow::In)?)
        } else {
            None
        };
        let outbound = if descriptor.direction.includes_out() {
            Some(Announcement::prepare(identity, descriptor, Flow::Out)?)
        } else {
            None
        };

        if let Some(inbound) = inbound {
            self.send(&inbound);
            let state_topic = inbound.topics.state.as_str();
            if let Err(e) = self.transport.subscribe(state_topic) {
                warn!("subscribe to {} failed: {:?}", state_topic, e);
            }
            registry.add(state_topic, handler)?;
        }
        if let Some(outbound) = outbound {
            self.send(&outbound);
        }
        Ok(())
    }

    /// Announce an outbound-only entity.
    ///
    /// # Errors
    ///
    /// [`Error::HandlerRequired`] if `descriptor` has an inbound flow.
    pub fn register_output(
        &mut self,
        identity: &DeviceIdentity,
        descriptor: &EntityDescriptor<'_>,
    ) -> Result<EntityTopics, Error> {
        if descriptor.direction.includes_in() {
            return Err(Error::HandlerRequired);
        }
        self.announce(identity, descriptor, Flow::Out)
    }

    fn send(&mut self, announcement: &Announcement) {
        let topic = announcement.topics.config.as_str();
        match self.transport.publish(topic, &announcement.payload) {
            Ok(()) => debug!("discovery published to {}", topic),
            Err(e) => warn!("discovery publish to {} failed: {:?}", topic, e),
        }
    }
}
