//! Hand-written doubles for the platform traits.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use hamqtt::homeassistant::TopicHandler;
use hamqtt::network::application::mqtt::{BrokerConfig, BrokerTransport, PublishPacket};
use hamqtt::network::error::Error;
use hamqtt::network::{HardwareAddress, WirelessLink};

pub const MAC: HardwareAddress = HardwareAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// A link that refuses a scripted number of joins before succeeding.
#[derive(Debug)]
pub struct MockLink {
    pub failures_left: Option<u32>,
    pub attempts: u32,
    pub associated: bool,
    pub joined: Option<(String, String)>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::failing(0)
    }

    pub fn failing(times: u32) -> Self {
        Self {
            failures_left: Some(times),
            attempts: 0,
            associated: false,
            joined: None,
        }
    }

    pub fn never_joins() -> Self {
        Self {
            failures_left: None,
            ..Self::new()
        }
    }
}

impl WirelessLink for MockLink {
    type Error = Error;

    fn associate(&mut self, ssid: &str, password: &str) -> Result<(), Error> {
        self.attempts += 1;
        match self.failures_left.as_mut() {
            Some(0) => {
                self.associated = true;
                self.joined = Some((ssid.to_string(), password.to_string()));
                Ok(())
            }
            Some(left) => {
                *left -= 1;
                Err(Error::Timeout)
            }
            None => Err(Error::Timeout),
        }
    }

    fn disassociate(&mut self) -> Result<(), Error> {
        self.associated = false;
        Ok(())
    }

    fn is_associated(&self) -> bool {
        self.associated
    }

    fn hardware_address(&self) -> HardwareAddress {
        MAC
    }
}

/// A broker that records everything sent through it.
#[derive(Debug, Default)]
pub struct MockTransport {
    pub refuse_connects: u32,
    pub connects: Vec<(String, u16, String, Option<String>, Option<String>)>,
    pub connected: bool,
    pub published: Vec<(String, Vec<u8>)>,
    pub subscriptions: Vec<String>,
    pub inbound: VecDeque<PublishPacket>,
    pub fail_next_poll: bool,
    pub reject_next_poll: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an inbound message for the next poll.
    pub fn deliver(&mut self, topic: &str, payload: &[u8]) {
        self.inbound.push_back(PublishPacket {
            topic: heapless::String::try_from(topic).unwrap(),
            payload: heapless::Vec::from_slice(payload).unwrap(),
        });
    }

    pub fn published_topics(&self) -> Vec<&str> {
        self.published.iter().map(|(t, _)| t.as_str()).collect()
    }

    pub fn payload_on(&self, topic: &str) -> Option<&str> {
        self.published
            .iter()
            .find(|(t, _)| t == topic)
            .map(|(_, p)| std::str::from_utf8(p).unwrap())
    }
}

impl BrokerTransport for MockTransport {
    type Error = Error;

    fn connect(&mut self, broker: &BrokerConfig<'_>, client_id: &str) -> Result<(), Error> {
        self.connects.push((
            broker.host.to_string(),
            broker.port,
            client_id.to_string(),
            broker.username.map(str::to_string),
            broker.password.map(str::to_string),
        ));
        if self.refuse_connects > 0 {
            self.refuse_connects -= 1;
            return Err(Error::ConnectionRefused);
        }
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Error> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Error> {
        if !self.connected {
            return Err(Error::NotOpen);
        }
        self.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Error> {
        if !self.connected {
            return Err(Error::NotOpen);
        }
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<PublishPacket>, Error> {
        if std::mem::take(&mut self.fail_next_poll) {
            self.connected = false;
            return Err(Error::ConnectionClosed);
        }
        if std::mem::take(&mut self.reject_next_poll) {
            return Err(Error::BufferOverflow);
        }
        if !self.connected {
            return Err(Error::NotOpen);
        }
        Ok(self.inbound.pop_front())
    }
}

/// Records requested delays instead of sleeping.
#[derive(Debug, Default)]
pub struct MockDelay {
    pub delays_ms: Vec<u32>,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.delays_ms.push(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays_ms.push(ms);
    }
}

/// Shared log of payloads a handler received.
pub type Received = Rc<RefCell<Vec<String>>>;

/// A handler that appends every payload to a shared log.
#[derive(Debug, Clone)]
pub struct Recorder(pub Received);

impl Recorder {
    pub fn new() -> (Self, Received) {
        let received = Received::default();
        (Self(received.clone()), received)
    }
}

impl TopicHandler for Recorder {
    fn handle(&mut self, payload: &str) {
        self.0.borrow_mut().push(payload.to_string());
    }
}
