//! Home Assistant MQTT discovery for a single device.
//!
//! The entry point is [`DeviceSession`]: build a [`DeviceConfig`], create a
//! session from it and the platform's link, transport and delay, then
//! [`connect`](DeviceSession::connect), register entities and call
//! [`service`](DeviceSession::service) from the main loop.
//!
//! The building blocks are public as well, for firmware that wants to drive
//! them itself:
//!
//! - [`ConnectionManager`]: network and broker bring-up with a [`RetryPolicy`]
//! - [`CallbackRegistry`]: inbound topic to [`TopicHandler`] routing
//! - [`MessageDispatcher`]: payload decoding in front of the registry
//! - [`DiscoveryPublisher`]: discovery messages and inbound subscriptions
//! - [`StatePublisher`]: `{"<code>":"<value>"}` state messages
//!
//! # Example
//!
//! ```rust
//! use hamqtt::homeassistant::{CallbackRegistry, Direction, EntityDescriptor, FnHandler};
//! use hamqtt::homeassistant::{DeviceIdentity, EntityTopics, Flow};
//!
//! let identity = DeviceIdentity::new("ABC123").unwrap();
//! let setpoint = EntityDescriptor::new("Setpoint", "temp", Direction::In);
//! let topics = EntityTopics::new(&identity, setpoint.code, Flow::In).unwrap();
//! assert_eq!(topics.config, "homeassistant/sensor/in/ABC123_temp/config");
//!
//! let mut registry: CallbackRegistry<_> = CallbackRegistry::new();
//! registry.add(&topics.state, FnHandler(|value: &str| assert_eq!(value, "22"))).unwrap();
//! assert!(registry.dispatch("homeassistant/sensor/in/ABC123_temp/state", "22"));
//! ```

mod config;
mod connection;
mod discovery;
mod dispatcher;
mod entity;
mod error;
mod identity;
mod registry;
mod session;
mod state;
mod topic;

pub use config::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL_MS, DeviceConfig, NetworkConfig, RetryPolicy,
};
pub use connection::{ConnectionManager, ConnectionState};
pub use discovery::{DiscoveryPublisher, MAX_DISCOVERY_LEN, discovery_payload};
pub use dispatcher::{DECODED_PAYLOAD_LEN, MessageDispatcher, decode_payload};
pub use entity::{Direction, EntityDescriptor, Flow};
pub use error::{Error, Stage};
pub use identity::{DeviceIdentity, MAX_IDENTITY_LEN};
pub use registry::{CallbackRegistry, DEFAULT_CAPACITY, FnHandler, Registration, TopicHandler};
pub use session::DeviceSession;
pub use state::{MAX_STATE_LEN, StatePublisher, state_payload};
pub use topic::{
    DISCOVERY_PREFIX, EntityTopics, MAX_TOPIC_LEN, Topic, config_topic, state_topic, unique_id,
};
