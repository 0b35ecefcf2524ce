mod common;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use common::{MockDelay, MockLink, Recorder};
use hamqtt::homeassistant::{
    self, ConnectionState, DeviceConfig, DeviceSession, Direction, EntityDescriptor,
    NetworkConfig, RetryPolicy,
};
use hamqtt::network::application::mqtt::{
    BrokerConfig, BrokerTransport, Client, MAX_IDLE_READS, MqttTransport, Options, QoS,
};
use hamqtt::network::error::Error;
use hamqtt::network::{Close, Connect, Connection, Read, Write};

const CONNACK_OK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

/// A byte stream fed from a script, recording everything written to it.
///
/// The first `stalls` reads come back empty, like a socket whose read
/// timeout expired.
struct ScriptedConnection {
    input: VecDeque<u8>,
    stalls: u32,
    written: Rc<RefCell<Vec<u8>>>,
    closed: Rc<RefCell<bool>>,
}

impl ScriptedConnection {
    fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            stalls: 0,
            written: Rc::default(),
            closed: Rc::default(),
        }
    }

    fn feed(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }
}

impl Read for ScriptedConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if self.stalls > 0 {
            self.stalls -= 1;
            return Ok(0);
        }
        let n = buf.len().min(self.input.len());
        for (slot, byte) in buf.iter_mut().zip(self.input.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for ScriptedConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        self.written.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

impl Close for ScriptedConnection {
    type Error = Error;

    fn close(self) -> Result<(), Error> {
        *self.closed.borrow_mut() = true;
        Ok(())
    }
}

impl Connection for ScriptedConnection {}

fn options<'a>(username: Option<&'a str>, password: Option<&'a str>) -> Options<'a> {
    Options {
        client_id: "dev",
        keep_alive_seconds: 60,
        clean_session: true,
        username,
        password,
    }
}

fn connected_client(after_connack: &[u8]) -> (Client<ScriptedConnection>, Rc<RefCell<Vec<u8>>>) {
    let mut connection = ScriptedConnection::new(&CONNACK_OK);
    connection.feed(after_connack);
    let written = connection.written.clone();
    let client = Client::connect(connection, options(None, None)).unwrap();
    written.borrow_mut().clear();
    (client, written)
}

fn publish_packet(topic: &str, payload: &[u8]) -> Vec<u8> {
    let mut len = 2 + topic.len() + payload.len();
    let mut packet = vec![0x30];
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        packet.push(byte);
        if len == 0 {
            break;
        }
    }
    packet.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    packet.extend_from_slice(topic.as_bytes());
    packet.extend_from_slice(payload);
    packet
}

#[test]
fn connect_encodes_credentials() {
    let connection = ScriptedConnection::new(&CONNACK_OK);
    let written = connection.written.clone();
    let client = Client::connect(connection, options(Some("user"), Some("pw"))).unwrap();

    assert!(client.is_connected());
    let mut expected = vec![0x10, 25, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0xC2, 0x00, 0x3C];
    expected.extend_from_slice(&[0x00, 0x03, b'd', b'e', b'v']);
    expected.extend_from_slice(&[0x00, 0x04, b'u', b's', b'e', b'r']);
    expected.extend_from_slice(&[0x00, 0x02, b'p', b'w']);
    assert_eq!(*written.borrow(), expected);
}

#[test]
fn connect_without_username_ignores_password() {
    let connection = ScriptedConnection::new(&CONNACK_OK);
    let written = connection.written.clone();
    Client::connect(connection, options(None, Some("pw"))).unwrap();

    let written = written.borrow();
    assert_eq!(written[1], 15);
    assert_eq!(written[9], 0x02);
}

#[test]
fn refused_connack_is_an_error() {
    let connection = ScriptedConnection::new(&[0x20, 0x02, 0x00, 0x05]);
    assert_eq!(
        Client::connect(connection, options(None, None)).unwrap_err(),
        Error::ConnectionRefused
    );
}

#[test]
fn garbage_instead_of_connack_is_a_protocol_error() {
    let connection = ScriptedConnection::new(&[0x30, 0x02, 0x00, 0x00]);
    assert_eq!(
        Client::connect(connection, options(None, None)).unwrap_err(),
        Error::ProtocolError
    );
}

#[test]
fn silent_broker_times_out_the_handshake() {
    let connection = ScriptedConnection::new(&[0x20]);
    assert_eq!(
        Client::connect(connection, options(None, None)).unwrap_err(),
        Error::Timeout
    );
}

#[test]
fn slow_broker_still_completes_the_handshake() {
    let mut connection = ScriptedConnection::new(&CONNACK_OK);
    connection.stalls = MAX_IDLE_READS - 1;
    let client = Client::connect(connection, options(None, None)).unwrap();
    assert!(client.is_connected());
}

#[test]
fn stalled_broker_gives_up_after_idle_limit() {
    let mut connection = ScriptedConnection::new(&CONNACK_OK);
    connection.stalls = MAX_IDLE_READS;
    assert_eq!(
        Client::connect(connection, options(None, None)).unwrap_err(),
        Error::Timeout
    );
}

#[test]
fn subscribe_waits_for_matching_suback() {
    let (mut client, written) = connected_client(&[0x90, 0x03, 0x00, 0x01, 0x00]);
    client.subscribe("a/b", QoS::AtMostOnce).unwrap();

    assert_eq!(
        *written.borrow(),
        [0x82, 0x08, 0x00, 0x01, 0x00, 0x03, b'a', b'/', b'b', 0x00]
    );
}

#[test]
fn rejected_subscription_is_an_error() {
    let (mut client, _) = connected_client(&[0x90, 0x03, 0x00, 0x01, 0x80]);
    assert_eq!(
        client.subscribe("a/b", QoS::AtMostOnce),
        Err(Error::ProtocolError)
    );
}

#[test]
fn publish_before_suback_is_queued_for_poll() {
    let mut script = publish_packet("a/b", b"early");
    script.extend_from_slice(&[0xD0, 0x00]);
    script.extend_from_slice(&[0x90, 0x03, 0x00, 0x01, 0x00]);
    let (mut client, _) = connected_client(&script);

    client.subscribe("a/b", QoS::AtMostOnce).unwrap();
    assert!(client.is_connected());

    let message = client.poll().unwrap().unwrap();
    assert_eq!(message.topic, "a/b");
    assert_eq!(&message.payload[..], b"early");
    assert_eq!(client.poll(), Ok(None));
}

#[test]
fn suback_for_another_packet_is_an_error() {
    let (mut client, _) = connected_client(&[0x90, 0x03, 0x00, 0x09, 0x00]);
    assert_eq!(
        client.subscribe("a/b", QoS::AtMostOnce),
        Err(Error::ProtocolError)
    );
}

#[test]
fn packet_ids_increment() {
    let (mut client, written) = connected_client(&[
        0x90, 0x03, 0x00, 0x01, 0x00, //
        0x90, 0x03, 0x00, 0x02, 0x00,
    ]);
    client.subscribe("a", QoS::AtMostOnce).unwrap();
    client.subscribe("b", QoS::AtMostOnce).unwrap();
    assert_eq!(&written.borrow()[8..12], &[0x82, 0x06, 0x00, 0x02]);
}

#[test]
fn publish_qos0_has_no_packet_id() {
    let (mut client, written) = connected_client(&[]);
    client.publish("a/b", b"hi", QoS::AtMostOnce).unwrap();

    assert_eq!(
        *written.borrow(),
        [0x30, 0x07, 0x00, 0x03, b'a', b'/', b'b', b'h', b'i']
    );
}

#[test]
fn oversized_publish_is_rejected_locally() {
    let (mut client, written) = connected_client(&[]);
    let payload = vec![0u8; 2048];
    assert_eq!(
        client.publish("a/b", &payload, QoS::AtMostOnce),
        Err(Error::BufferOverflow)
    );
    assert!(written.borrow().is_empty());
    assert!(client.is_connected());
}

#[test]
fn poll_skips_pingresp_and_returns_publish() {
    let (mut client, _) = connected_client(&[
        0xD0, 0x00, //
        0x30, 0x07, 0x00, 0x03, b'a', b'/', b'b', b'O', b'N',
    ]);

    assert_eq!(client.poll(), Ok(None));
    let message = client.poll().unwrap().unwrap();
    assert_eq!(message.topic, "a/b");
    assert_eq!(&message.payload[..], b"ON");
    assert_eq!(client.poll(), Ok(None));
}

#[test]
fn poll_strips_packet_id_of_qos1_publish() {
    let (mut client, _) = connected_client(&[
        0x32, 0x09, 0x00, 0x03, b'a', b'/', b'b', 0x00, 0x07, b'O', b'N',
    ]);
    let message = client.poll().unwrap().unwrap();
    assert_eq!(&message.payload[..], b"ON");
}

#[test]
fn oversized_inbound_publish_is_skipped() {
    let mut script = publish_packet("a/b", &[b'x'; 1100]);
    script.extend(publish_packet("a/b", b"ON"));
    let (mut client, _) = connected_client(&script);

    assert_eq!(client.poll(), Err(Error::BufferOverflow));
    assert!(client.is_connected());
    let message = client.poll().unwrap().unwrap();
    assert_eq!(&message.payload[..], b"ON");
}

#[test]
fn bad_remaining_length_marks_client_disconnected() {
    let (mut client, _) = connected_client(&[0x30, 0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(client.poll(), Err(Error::ProtocolError));
    assert!(!client.is_connected());
}

#[test]
fn truncated_publish_marks_client_disconnected() {
    let (mut client, _) = connected_client(&[0x30, 0x07, 0x00, 0x03, b'a']);
    assert_eq!(client.poll(), Err(Error::Timeout));
    assert!(!client.is_connected());
    assert_eq!(client.publish("a", b"x", QoS::AtMostOnce), Err(Error::NotOpen));
}

#[test]
fn ping_and_disconnect() {
    let (mut client, written) = connected_client(&[]);
    let closed = client.connection().closed.clone();
    client.ping().unwrap();
    client.disconnect().unwrap();

    assert_eq!(*written.borrow(), [0xC0, 0x00, 0xE0, 0x00]);
    assert!(*closed.borrow());
}

/// Hands out scripted connections and records where they were opened to.
#[derive(Default)]
struct ScriptedConnector {
    scripts: VecDeque<Vec<u8>>,
    remotes: Vec<String>,
}

impl Connect for ScriptedConnector {
    type Connection = ScriptedConnection;
    type Error = Error;

    fn connect(&mut self, remote: &str) -> Result<ScriptedConnection, Error> {
        self.remotes.push(remote.to_string());
        match self.scripts.pop_front() {
            Some(script) => Ok(ScriptedConnection::new(&script)),
            None => Err(Error::Timeout),
        }
    }
}

#[test]
fn transport_opens_host_port_and_handshakes() {
    let mut connector = ScriptedConnector::default();
    connector.scripts.push_back(CONNACK_OK.to_vec());
    let mut transport = MqttTransport::new(connector);

    let broker = BrokerConfig::new("broker.local", 1884).with_credentials("u", "p");
    transport.connect(&broker, "dev").unwrap();

    assert!(transport.is_connected());
    assert_eq!(transport.connector_mut().remotes, ["broker.local:1884"]);
    let written = transport.client().unwrap().connection().written.borrow().clone();
    assert_eq!(written[9], 0xC2);
    assert_eq!(&written[10..12], &60u16.to_be_bytes());
}

#[test]
fn transport_reports_unreachable_broker() {
    let mut transport = MqttTransport::new(ScriptedConnector::default());
    let broker = BrokerConfig::new("broker.local", 1883);

    assert_eq!(transport.connect(&broker, "dev"), Err(Error::ConnectionRefused));
    assert!(!transport.is_connected());
    assert_eq!(transport.publish("a", b"x"), Err(Error::NotOpen));
    assert_eq!(transport.poll(), Err(Error::NotOpen));
}

#[test]
fn transport_drops_failed_session() {
    let mut connector = ScriptedConnector::default();
    connector.scripts.push_back(CONNACK_OK.to_vec());
    let mut transport = MqttTransport::new(connector);
    transport
        .connect(&BrokerConfig::new("broker.local", 1883), "dev")
        .unwrap();

    // SUBACK never arrives
    assert_eq!(transport.subscribe("a"), Err(Error::Timeout));
    assert!(!transport.is_connected());
    assert!(transport.client().is_none());
}

#[test]
fn transport_flags_unencodable_connect_as_fatal() {
    let transport = MqttTransport::new(ScriptedConnector::default());
    assert!(transport.is_fatal(&Error::BufferOverflow));
    assert!(transport.is_fatal(&Error::InvalidAddress));
    assert!(!transport.is_fatal(&Error::ConnectionRefused));
    assert!(!transport.is_fatal(&Error::Timeout));
}

const SETPOINT: EntityDescriptor<'static> =
    EntityDescriptor::new("Setpoint", "temp", Direction::In).with_unit("°C");
const SETPOINT_STATE: &str = "homeassistant/sensor/in/ABC123_temp/state";

fn device_config(broker: BrokerConfig<'_>) -> DeviceConfig<'_> {
    DeviceConfig::new(NetworkConfig::new("home", "wifi-pass"), broker)
        .with_device_id("ABC123")
        .with_retry(RetryPolicy::fixed(1000, 5))
}

#[test]
fn session_over_mqtt_transport_round_trip() {
    let mut script = CONNACK_OK.to_vec();
    script.extend(publish_packet(SETPOINT_STATE, b"early"));
    script.extend_from_slice(&[0x90, 0x03, 0x00, 0x01, 0x00]);
    script.extend(publish_packet(SETPOINT_STATE, &[b'9'; 1100]));
    script.extend(publish_packet(SETPOINT_STATE, b"21.5"));
    let mut connector = ScriptedConnector::default();
    connector.scripts.push_back(script);

    let mut session: DeviceSession<'_, _, _, _, Recorder> = DeviceSession::new(
        device_config(BrokerConfig::new("broker.local", 1883)),
        MockLink::new(),
        MqttTransport::new(connector),
        MockDelay::default(),
    )
    .unwrap();
    session.connect().unwrap();
    let (handler, log) = Recorder::new();
    session.register_endpoint(&SETPOINT, handler).unwrap();
    assert!(session.is_connected());

    // queued while the SUBACK was awaited
    assert!(session.service());
    // too large for the client, dropped without losing the session
    assert!(!session.service());
    assert_eq!(session.state(), ConnectionState::Connected);
    assert!(session.is_connected());
    assert!(session.service());
    assert!(!session.service());

    assert_eq!(*log.borrow(), ["early", "21.5"]);
    let transport = session.connection_mut().transport_mut();
    assert_eq!(transport.connector_mut().remotes, ["broker.local:1883"]);
    let written = transport.client().unwrap().connection().written.borrow().clone();
    let mut subscribe = vec![0x82, 0x2E, 0x00, 0x01, 0x00, 0x29];
    subscribe.extend_from_slice(SETPOINT_STATE.as_bytes());
    subscribe.push(0x00);
    assert!(written.ends_with(&subscribe));
}

#[test]
fn unencodable_credentials_are_not_retried() {
    let password = "p".repeat(600);
    let mut connector = ScriptedConnector::default();
    connector.scripts.push_back(CONNACK_OK.to_vec());

    let mut session: DeviceSession<'_, _, _, _, Recorder> = DeviceSession::new(
        device_config(BrokerConfig::new("broker.local", 1883).with_credentials("mqtt", &password)),
        MockLink::new(),
        MqttTransport::new(connector),
        MockDelay::default(),
    )
    .unwrap();

    assert_eq!(session.connect(), Err(homeassistant::Error::InvalidConfig));
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(session.connection().delay().delays_ms.is_empty());
    assert_eq!(
        session.connection_mut().transport_mut().connector_mut().remotes.len(),
        1
    );
}
