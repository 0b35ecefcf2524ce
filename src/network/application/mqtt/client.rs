//! MQTT 3.1.1 client implementation for embedded systems.
//!
//! This module provides a lightweight MQTT client designed for `no_std` environments
//! and embedded systems. It implements the subset of MQTT 3.1.1 a discovery
//! device needs, with a focus on simplicity, predictable memory use and
//! running over any byte stream.
//!
//! # Features
//!
//! - CONNECT with optional username/password, clean session and keep-alive
//! - PUBLISH at any QoS level (acknowledgements are not tracked)
//! - SUBSCRIBE with SUBACK verification
//! - Non-blocking polling for inbound PUBLISH packets
//! - PINGREQ keep-alive and graceful DISCONNECT
//! - Fixed-size buffers for predictable memory usage
//!
//! # Examples
//!
//! ```rust,no_run
//! use hamqtt::network::application::mqtt::{Client, Options, QoS};
//! # use hamqtt::network::Connection;
//! # struct MockConnection;
//! # impl Connection for MockConnection {}
//! # impl hamqtt::network::Read for MockConnection {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl hamqtt::network::Write for MockConnection {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl hamqtt::network::Close for MockConnection {
//! #     type Error = ();
//! #     fn close(self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//!
//! let options = Options {
//!     client_id: "AABBCCDDEEFF",
//!     keep_alive_seconds: 60,
//!     clean_session: true,
//!     username: Some("mqtt"),
//!     password: Some("secret"),
//! };
//!
//! let mut client = Client::connect(MockConnection, options)?;
//! client.subscribe("homeassistant/sensor/in/AABBCCDDEEFF_relay/state", QoS::AtMostOnce)?;
//! client.publish("homeassistant/sensor/out/AABBCCDDEEFF_temp/state", br#"{"temp":"21.5"}"#, QoS::AtMostOnce)?;
//!
//! while let Some(message) = client.poll()? {
//!     // route message.topic / message.payload
//! #   let _ = message;
//! }
//! # Ok::<(), hamqtt::network::error::Error>(())
//! ```

use crate::network::error::Error;
use crate::network::{Connection, Read, Write};
use heapless::{Deque, String, Vec};

// MQTT Control Packet types - these are the fixed header packet type values
/// MQTT CONNECT packet type identifier.
const CONNECT: u8 = 0x10;
/// MQTT CONNACK packet type identifier.
const CONNACK: u8 = 0x20;
/// MQTT PUBLISH packet type identifier.
const PUBLISH: u8 = 0x30;
/// MQTT SUBSCRIBE packet type identifier (with the mandatory reserved bits).
const SUBSCRIBE: u8 = 0x82;
/// MQTT SUBACK packet type identifier.
const SUBACK: u8 = 0x90;
/// MQTT PINGREQ packet type identifier.
const PINGREQ: u8 = 0xC0;
/// MQTT DISCONNECT packet type identifier.
const DISCONNECT: u8 = 0xE0;

// Protocol constants defined by MQTT 3.1.1 specification
/// MQTT protocol name as defined in the specification.
const PROTOCOL_NAME: &[u8] = b"MQTT";
/// MQTT protocol level for version 3.1.1.
const PROTOCOL_LEVEL: u8 = 4;

const FLAG_CLEAN_SESSION: u8 = 0x02;
const FLAG_PASSWORD: u8 = 0x40;
const FLAG_USERNAME: u8 = 0x80;

/// SUBACK return code signalling a rejected subscription.
const SUBACK_FAILURE: u8 = 0x80;

/// Maximum topic length in bytes for inbound and outbound messages.
pub const MAX_TOPIC_LEN: usize = 256;

/// Maximum payload length in bytes for inbound and outbound messages.
pub const MAX_PAYLOAD_LEN: usize = 1024;

/// Largest packet body (topic length prefix, topic, packet id, payload).
const MAX_PACKET_LEN: usize = 2 + MAX_TOPIC_LEN + 2 + MAX_PAYLOAD_LEN;

/// Consecutive empty reads tolerated while a packet or an acknowledgement is
/// outstanding. Past this the broker is treated as unresponsive.
pub const MAX_IDLE_READS: u32 = 64;

/// PUBLISH packets held back while a SUBACK is awaited.
const MAX_PENDING: usize = 4;

/// One control packet read off the stream.
enum Incoming {
    Publish(PublishPacket),
    SubAck { packet_id: u16, return_code: u8 },
    /// A PUBLISH whose topic or payload does not fit the client buffers.
    Oversized,
    Other,
}

/// An incoming MQTT publish message.
///
/// This structure represents a message received from the MQTT broker when
/// subscribed to one or more topics. It contains both the topic name and
/// the message payload.
///
/// # Examples
///
/// ```rust
/// use hamqtt::network::application::mqtt::PublishPacket;
/// use heapless::{String, Vec};
///
/// let packet = PublishPacket {
///     topic: String::try_from("homeassistant/sensor/in/ABC123_relay/state").unwrap(),
///     payload: Vec::from_slice(b"ON").unwrap(),
/// };
///
/// assert_eq!(&packet.payload[..], b"ON");
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PublishPacket {
    /// The topic on which the message was published.
    pub topic: String<MAX_TOPIC_LEN>,

    /// The message payload data.
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
}

/// Quality of Service levels for MQTT messages.
///
/// Discovery and state traffic is sent fire-and-forget at
/// [`QoS::AtMostOnce`]; the higher levels are encoded on the wire but their
/// acknowledgements are not tracked by this client.
///
/// ```rust
/// use hamqtt::network::application::mqtt::QoS;
///
/// assert_eq!(QoS::AtMostOnce as u8, 0);
/// assert_eq!(QoS::AtLeastOnce as u8, 1);
/// assert_eq!(QoS::ExactlyOnce as u8, 2);
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QoS {
    /// **QoS 0**: At most once delivery.
    AtMostOnce = 0,
    /// **QoS 1**: At least once delivery.
    AtLeastOnce = 1,
    /// **QoS 2**: Exactly once delivery.
    ExactlyOnce = 2,
}

/// Configuration options for MQTT client connection.
///
/// # Examples
///
/// ```rust
/// use hamqtt::network::application::mqtt::Options;
///
/// let options = Options {
///     client_id: "AABBCCDDEEFF",
///     keep_alive_seconds: 60,
///     clean_session: true,
///     username: None,
///     password: None,
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Options<'a> {
    /// The client identifier, must be unique within the broker.
    ///
    /// If a client connects with a client identifier that is already in use by
    /// another client, the broker will disconnect the existing client.
    pub client_id: &'a str,

    /// The keep-alive time interval in seconds. A value of 0 disables keep-alive.
    pub keep_alive_seconds: u16,

    /// Whether to start a clean session.
    ///
    /// Clean sessions don't preserve subscriptions across reconnections.
    pub clean_session: bool,

    /// Optional user name sent in the CONNECT payload.
    pub username: Option<&'a str>,

    /// Optional password sent in the CONNECT payload.
    ///
    /// MQTT 3.1.1 only allows a password together with a user name; a lone
    /// password is ignored.
    pub password: Option<&'a str>,
}

/// An MQTT 3.1.1 client for publish-subscribe messaging.
///
/// The client manages a connection to an MQTT broker and provides methods for
/// publishing messages, subscribing to topics, and receiving incoming messages.
/// It's designed to work with any connection type implementing the [`Connection`] trait.
pub struct Client<C: Connection> {
    connection: C,
    is_connected: bool,
    next_packet_id: u16,
    pending: Deque<PublishPacket, MAX_PENDING>,
}

impl<C: Connection> Client<C> {
    /// Establish an MQTT connection with the broker.
    ///
    /// Sends a CONNECT packet and waits for the CONNACK response. If
    /// successful, it returns a connected client ready for publishing and
    /// subscribing.
    ///
    /// # Errors
    ///
    /// * [`Error::WriteError`] - Failed to send CONNECT packet
    /// * [`Error::ReadError`] - Failed to read CONNACK response
    /// * [`Error::Timeout`] - No CONNACK within [`MAX_IDLE_READS`] empty reads
    /// * [`Error::ConnectionRefused`] - Broker refused the connection (return codes 1-5)
    /// * [`Error::ProtocolError`] - Invalid CONNACK packet received
    /// * [`Error::BufferOverflow`] - Client id or credentials too long
    pub fn connect(connection: C, options: Options) -> Result<Self, Error> {
        // --- Variable Header ---
        let mut vh: Vec<u8, 10> = Vec::new();
        push_field(&mut vh, PROTOCOL_NAME)?;
        push_byte(&mut vh, PROTOCOL_LEVEL)?;

        let username = options.username;
        let password = username.and(options.password);

        let mut connect_flags = 0;
        if options.clean_session {
            connect_flags |= FLAG_CLEAN_SESSION;
        }
        if username.is_some() {
            connect_flags |= FLAG_USERNAME;
        }
        if password.is_some() {
            connect_flags |= FLAG_PASSWORD;
        }
        push_byte(&mut vh, connect_flags)?;
        push_bytes(&mut vh, &options.keep_alive_seconds.to_be_bytes())?;

        // --- Payload ---
        let mut payload: Vec<u8, 512> = Vec::new();
        push_field(&mut payload, options.client_id.as_bytes())?;
        if let Some(username) = username {
            push_field(&mut payload, username.as_bytes())?;
        }
        if let Some(password) = password {
            push_field(&mut payload, password.as_bytes())?;
        }

        // --- Fixed Header ---
        let mut fixed_header: Vec<u8, 5> = Vec::new();
        push_byte(&mut fixed_header, CONNECT)?;
        encode_remaining_length(&mut fixed_header, vh.len() + payload.len())?;

        let mut client = Self {
            connection,
            is_connected: false,
            next_packet_id: 1,
            pending: Deque::new(),
        };

        client.write_all(&fixed_header)?;
        client.write_all(&vh)?;
        client.write_all(&payload)?;
        client.flush()?;

        // Wait for and parse CONNACK
        let mut connack_buf = [0u8; 4];
        client.read_exact(&mut connack_buf)?;

        if connack_buf[0] != CONNACK || connack_buf[1] != 2 {
            return Err(Error::ProtocolError);
        }

        // Check connection acknowledgement status
        match connack_buf[3] {
            0 => {
                client.is_connected = true;
                Ok(client)
            }
            1..=5 => Err(Error::ConnectionRefused),
            _ => Err(Error::ProtocolError),
        }
    }

    /// Whether the handshake succeeded and no I/O error has occurred since.
    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    /// Publish a message to a specific topic.
    ///
    /// Sends a PUBLISH packet with the given topic, payload and QoS. For QoS
    /// 1 and 2 a packet identifier is included but acknowledgements are not
    /// awaited.
    ///
    /// # Errors
    ///
    /// * [`Error::NotOpen`] - The client is no longer connected
    /// * [`Error::WriteError`] - Failed to send the publish packet
    /// * [`Error::BufferOverflow`] - Topic or payload exceeds the packet buffer
    pub fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), Error> {
        self.ensure_connected()?;
        if topic.len() > MAX_TOPIC_LEN || payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::BufferOverflow);
        }

        let mut fixed_header: Vec<u8, 5> = Vec::new();
        let mut packet: Vec<u8, MAX_PACKET_LEN> = Vec::new();

        // --- Variable Header ---
        push_field(&mut packet, topic.as_bytes())?;
        if qos != QoS::AtMostOnce {
            let packet_id = self.take_packet_id();
            push_bytes(&mut packet, &packet_id.to_be_bytes())?;
        }

        // --- Payload ---
        push_bytes(&mut packet, payload)?;

        // --- Fixed Header ---
        push_byte(&mut fixed_header, PUBLISH | ((qos as u8) << 1))?;
        encode_remaining_length(&mut fixed_header, packet.len())?;

        self.write_all(&fixed_header)?;
        self.write_all(&packet)?;
        self.flush()
    }

    /// Subscribe to a topic to receive messages.
    ///
    /// Sends a SUBSCRIBE packet and waits for the broker's SUBACK. PUBLISH
    /// packets arriving in the meantime are queued and handed out by
    /// [`poll`](Client::poll); other control packets are skipped.
    ///
    /// # Errors
    ///
    /// * [`Error::NotOpen`] - The client is no longer connected
    /// * [`Error::WriteError`] - Failed to send the subscribe packet
    /// * [`Error::ReadError`] - Failed to read SUBACK response
    /// * [`Error::Timeout`] - No SUBACK within [`MAX_IDLE_READS`] empty reads
    /// * [`Error::ProtocolError`] - Malformed SUBACK, mismatched packet id or
    ///   the broker rejected the subscription
    pub fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), Error> {
        self.ensure_connected()?;

        let mut fixed_header: Vec<u8, 5> = Vec::new();
        let mut packet: Vec<u8, { MAX_TOPIC_LEN + 5 }> = Vec::new();

        // --- Variable Header (Packet Identifier) ---
        let packet_id = self.take_packet_id();
        push_bytes(&mut packet, &packet_id.to_be_bytes())?;

        // --- Payload ---
        push_field(&mut packet, topic.as_bytes())?;
        push_byte(&mut packet, qos as u8)?;

        // --- Fixed Header ---
        push_byte(&mut fixed_header, SUBSCRIBE)?;
        encode_remaining_length(&mut fixed_header, packet.len())?;

        self.write_all(&fixed_header)?;
        self.write_all(&packet)?;
        self.flush()?;

        loop {
            match self.read_incoming(true)? {
                Some(Incoming::SubAck {
                    packet_id: acked,
                    return_code,
                }) => {
                    if acked != packet_id || return_code == SUBACK_FAILURE {
                        return Err(Error::ProtocolError);
                    }
                    return Ok(());
                }
                Some(Incoming::Publish(message)) => {
                    if self.pending.push_back(message).is_err() {
                        warn!("inbound queue full, dropping message");
                    }
                }
                Some(Incoming::Oversized) => warn!("dropping oversized inbound message"),
                Some(Incoming::Other) | None => {}
            }
        }
    }

    /// Send a PINGREQ to keep the session alive.
    ///
    /// The matching PINGRESP is consumed by [`poll`](Client::poll).
    pub fn ping(&mut self) -> Result<(), Error> {
        self.ensure_connected()?;
        self.write_all(&[PINGREQ, 0])?;
        self.flush()
    }

    /// Poll the connection for an incoming PUBLISH message.
    ///
    /// Messages queued while [`subscribe`](Client::subscribe) waited for its
    /// SUBACK come first. Otherwise returns `Ok(None)` immediately when no
    /// data is available. Control packets other than PUBLISH (PINGRESP,
    /// stray acknowledgements) are read and discarded, also yielding
    /// `Ok(None)`.
    ///
    /// A malformed or oversized PUBLISH is consumed whole, so the client
    /// stays connected after [`Error::ProtocolError`] or
    /// [`Error::BufferOverflow`].
    ///
    /// # Errors
    ///
    /// * [`Error::NotOpen`] - The client is no longer connected
    /// * [`Error::ReadError`] - Failed to read from the connection
    /// * [`Error::Timeout`] - The stream stalled inside a packet
    /// * [`Error::ProtocolError`] - Malformed packet or non UTF-8 topic
    /// * [`Error::BufferOverflow`] - Topic or payload larger than the client buffers
    pub fn poll(&mut self) -> Result<Option<PublishPacket>, Error> {
        self.ensure_connected()?;

        if let Some(message) = self.pending.pop_front() {
            return Ok(Some(message));
        }

        match self.read_incoming(false)? {
            Some(Incoming::Publish(message)) => Ok(Some(message)),
            Some(Incoming::Oversized) => Err(Error::BufferOverflow),
            Some(Incoming::SubAck { .. } | Incoming::Other) | None => Ok(None),
        }
    }

    /// Send DISCONNECT and close the underlying connection.
    pub fn disconnect(mut self) -> Result<(), Error> {
        let sent = self.write_all(&[DISCONNECT, 0]).and_then(|_| self.flush());
        self.connection.close().map_err(|_| Error::ConnectionClosed)?;
        sent
    }

    /// Get the underlying connection
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Get a mutable reference to the underlying connection
    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    fn ensure_connected(&self) -> Result<(), Error> {
        if self.is_connected {
            Ok(())
        } else {
            Err(Error::NotOpen)
        }
    }

    /// Read one whole control packet. With `wait` unset an empty stream
    /// yields `Ok(None)` instead of blocking on the fixed header.
    fn read_incoming(&mut self, wait: bool) -> Result<Option<Incoming>, Error> {
        let mut header_buf = [0u8; 1];
        if wait {
            self.read_exact(&mut header_buf)?;
        } else {
            match self.connection.read(&mut header_buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {}
                Err(_) => {
                    self.is_connected = false;
                    return Err(Error::ReadError);
                }
            }
        }

        let header = header_buf[0];
        let remaining_len = self.read_remaining_length()?;

        if header == SUBACK {
            if remaining_len != 3 {
                self.discard(remaining_len)?;
                return Err(Error::ProtocolError);
            }
            let mut body = [0u8; 3];
            self.read_exact(&mut body)?;
            return Ok(Some(Incoming::SubAck {
                packet_id: u16::from_be_bytes([body[0], body[1]]),
                return_code: body[2],
            }));
        }

        if header & 0xF0 != PUBLISH {
            self.discard(remaining_len)?;
            return Ok(Some(Incoming::Other));
        }

        if remaining_len > MAX_PACKET_LEN {
            self.discard(remaining_len)?;
            return Ok(Some(Incoming::Oversized));
        }

        let mut body = Vec::<u8, MAX_PACKET_LEN>::new();
        body.resize(remaining_len, 0)
            .map_err(|_| Error::BufferOverflow)?;
        self.read_exact(&mut body)?;

        Ok(Some(match decode_publish(header, &body)? {
            Some(message) => Incoming::Publish(message),
            None => Incoming::Oversized,
        }))
    }

    fn take_packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        // Packet identifier 0 is reserved.
        self.next_packet_id = self.next_packet_id.checked_add(1).unwrap_or(1);
        id
    }

    fn write_all(&mut self, mut bytes: &[u8]) -> Result<(), Error> {
        while !bytes.is_empty() {
            match self.connection.write(bytes) {
                Ok(0) | Err(_) => {
                    self.is_connected = false;
                    return Err(Error::WriteError);
                }
                Ok(n) => bytes = &bytes[n..],
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.connection.flush().map_err(|_| {
            self.is_connected = false;
            Error::WriteError
        })
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        let mut total_read = 0;
        let mut idle_reads = 0;
        while total_read < buf.len() {
            match self.connection.read(&mut buf[total_read..]) {
                Ok(0) => {
                    idle_reads += 1;
                    if idle_reads >= MAX_IDLE_READS {
                        self.is_connected = false;
                        return Err(Error::Timeout);
                    }
                }
                Ok(n) => {
                    total_read += n;
                    idle_reads = 0;
                }
                Err(_) => {
                    self.is_connected = false;
                    return Err(Error::ReadError);
                }
            }
        }
        Ok(())
    }

    fn read_remaining_length(&mut self) -> Result<usize, Error> {
        let mut remaining_len = 0;
        let mut multiplier = 1;
        for _ in 0..4 {
            let mut byte = [0u8; 1];
            self.read_exact(&mut byte)?;
            remaining_len += (byte[0] as usize & 127) * multiplier;
            if byte[0] & 0x80 == 0 {
                return Ok(remaining_len);
            }
            multiplier *= 128;
        }
        // Packet boundaries are lost after a bad length.
        self.is_connected = false;
        Err(Error::ProtocolError)
    }

    fn discard(&mut self, mut len: usize) -> Result<(), Error> {
        let mut scratch = [0u8; 64];
        while len > 0 {
            let chunk = len.min(scratch.len());
            self.read_exact(&mut scratch[..chunk])?;
            len -= chunk;
        }
        Ok(())
    }
}

impl<C: Connection> core::fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("is_connected", &self.is_connected)
            .field("next_packet_id", &self.next_packet_id)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

/// Split a PUBLISH body into topic and payload. `None` means the topic or
/// payload does not fit the client buffers.
fn decode_publish(header: u8, body: &[u8]) -> Result<Option<PublishPacket>, Error> {
    if body.len() < 2 {
        return Err(Error::ProtocolError);
    }
    let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
    let topic_end = 2 + topic_len;
    let topic_bytes = body.get(2..topic_end).ok_or(Error::ProtocolError)?;
    let topic = core::str::from_utf8(topic_bytes).map_err(|_| Error::ProtocolError)?;

    // QoS 1 and 2 carry a packet identifier after the topic.
    let qos = (header >> 1) & 0x03;
    let payload_start = if qos == 0 { topic_end } else { topic_end + 2 };
    let payload = body.get(payload_start..).ok_or(Error::ProtocolError)?;

    let (Ok(topic), Ok(payload)) = (String::try_from(topic), Vec::from_slice(payload)) else {
        return Ok(None);
    };
    Ok(Some(PublishPacket { topic, payload }))
}

fn push_byte<const N: usize>(buf: &mut Vec<u8, N>, byte: u8) -> Result<(), Error> {
    buf.push(byte).map_err(|_| Error::BufferOverflow)
}

fn push_bytes<const N: usize>(buf: &mut Vec<u8, N>, bytes: &[u8]) -> Result<(), Error> {
    buf.extend_from_slice(bytes)
        .map_err(|_| Error::BufferOverflow)
}

/// Append a length-prefixed field (UTF-8 string or binary data).
fn push_field<const N: usize>(buf: &mut Vec<u8, N>, bytes: &[u8]) -> Result<(), Error> {
    let len = u16::try_from(bytes.len()).map_err(|_| Error::BufferOverflow)?;
    push_bytes(buf, &len.to_be_bytes())?;
    push_bytes(buf, bytes)
}

/// Encode the remaining length field for an MQTT packet.
///
/// The encoding uses up to 4 bytes where each byte encodes 7 bits of the length
/// value. The most significant bit indicates if another byte follows.
fn encode_remaining_length(buf: &mut Vec<u8, 5>, mut len: usize) -> Result<(), Error> {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        push_byte(buf, byte)?;
        if len == 0 {
            break;
        }
    }
    Ok(())
}
