//! Topic generation for Home Assistant discovery
//!
//! Every entity flow owns two topics:
//!
//! - `homeassistant/sensor/{in|out}/{device_id}_{code}/config`
//! - `homeassistant/sensor/{in|out}/{device_id}_{code}/state`

use core::fmt::Write;

use heapless::String;

use super::entity::Flow;
use super::error::Error;
use super::identity::DeviceIdentity;

/// Topic buffer size
pub const MAX_TOPIC_LEN: usize = 128;

/// Discovery prefix and component shared by every topic.
pub const DISCOVERY_PREFIX: &str = "homeassistant/sensor";

/// A topic string.
pub type Topic = String<MAX_TOPIC_LEN>;

/// The config/state topic pair of one entity flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTopics {
    /// Where the discovery message goes.
    pub config: Topic,
    /// Where state values travel.
    pub state: Topic,
}

impl EntityTopics {
    /// Derive both topics for `code` in `flow`.
    pub fn new(identity: &DeviceIdentity, code: &str, flow: Flow) -> Result<Self, Error> {
        Ok(Self {
            config: config_topic(identity, code, flow)?,
            state: state_topic(identity, code, flow)?,
        })
    }
}

/// Discovery config topic for `code` in `flow`.
pub fn config_topic(identity: &DeviceIdentity, code: &str, flow: Flow) -> Result<Topic, Error> {
    entity_topic(identity, code, flow, "config")
}

/// State topic for `code` in `flow`.
pub fn state_topic(identity: &DeviceIdentity, code: &str, flow: Flow) -> Result<Topic, Error> {
    entity_topic(identity, code, flow, "state")
}

fn entity_topic(
    identity: &DeviceIdentity,
    code: &str,
    flow: Flow,
    leaf: &str,
) -> Result<Topic, Error> {
    let mut topic = Topic::new();
    write!(
        topic,
        "{}/{}/{}_{}/{}",
        DISCOVERY_PREFIX,
        flow.segment(),
        identity,
        code,
        leaf
    )
    .map_err(|_| Error::TopicTooLong)?;
    Ok(topic)
}

/// Unique id of an entity flow: `{device_id}_{code}_{in|out}`.
pub fn unique_id<const N: usize>(
    identity: &DeviceIdentity,
    code: &str,
    flow: Flow,
) -> Result<String<N>, Error> {
    let mut id = String::new();
    write!(id, "{}_{}_{}", identity, code, flow.segment()).map_err(|_| Error::PayloadTooLarge)?;
    Ok(id)
}
