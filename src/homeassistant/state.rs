//! Outbound state messages.

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::entity::Flow;
use super::error::Error;
use super::identity::DeviceIdentity;
use super::topic;
use crate::network::application::mqtt::BrokerTransport;

/// State payload buffer size
pub const MAX_STATE_LEN: usize = 256;

/// A single-key JSON object, `{"<code>":"<value>"}`.
struct StatePayload<'a> {
    code: &'a str,
    value: &'a str,
}

impl Serialize for StatePayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.code, self.value)?;
        map.end()
    }
}

/// Serialize the state payload for `code` into `buf`, escaping both strings.
///
/// ```rust
/// use hamqtt::homeassistant::state_payload;
///
/// let mut buf = [0u8; 64];
/// let len = state_payload("temp", "21.5", &mut buf).unwrap();
/// assert_eq!(&buf[..len], br#"{"temp":"21.5"}"#);
/// ```
pub fn state_payload(code: &str, value: &str, buf: &mut [u8]) -> Result<usize, Error> {
    serde_json_core::to_slice(&StatePayload { code, value }, buf).map_err(|_| Error::PayloadTooLarge)
}

/// Publishes entity values through a borrowed transport.
#[derive(Debug)]
pub struct StatePublisher<'t, T> {
    transport: &'t mut T,
}

impl<'t, T: BrokerTransport> StatePublisher<'t, T> {
    /// Publish through `transport`.
    pub fn new(transport: &'t mut T) -> Self {
        Self { transport }
    }

    /// Publish `value` for entity `code` on its outbound state topic.
    ///
    /// Fire-and-forget: a message rejected by the transport, for instance
    /// while disconnected, is logged and dropped. Only local failures are
    /// returned.
    pub fn publish(&mut self, identity: &DeviceIdentity, code: &str, value: &str) -> Result<(), Error> {
        let topic = topic::state_topic(identity, code, Flow::Out)?;
        let mut buf = [0u8; MAX_STATE_LEN];
        let len = state_payload(code, value, &mut buf)?;

        if let Err(e) = self.transport.publish(&topic, &buf[..len]) {
            warn!("state publish to {} dropped: {:?}", topic.as_str(), e);
        }
        Ok(())
    }
}
