//! Error types for the Home Assistant device layer

use core::fmt;

/// Which part of the connection bring-up an error refers to.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Stage {
    /// Joining the wireless network.
    Network,
    /// The broker handshake.
    Broker,
}

/// Error type for Home Assistant device operations.
///
/// Transport failures while publishing or subscribing are deliberately absent:
/// delivery is fire-and-forget and such failures are only logged. What is
/// reported here are local conditions the caller can act on.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The retry policy gave up before the stage succeeded.
    RetriesExhausted {
        /// Stage that failed.
        stage: Stage,
        /// Number of attempts made.
        attempts: u32,
    },
    /// The callback registry is full.
    CapacityExceeded,
    /// A derived topic does not fit the topic buffer.
    TopicTooLong,
    /// A payload does not fit its serialization buffer.
    PayloadTooLarge,
    /// The device identity is empty, non-ASCII or too long.
    InvalidIdentity,
    /// An entity with an inbound direction was registered without a handler.
    HandlerRequired,
    /// The configuration could not be parsed, or the broker settings can
    /// never produce a valid handshake.
    InvalidConfig,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Network => f.write_str("network"),
            Stage::Broker => f.write_str("broker"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::RetriesExhausted { stage, attempts } => {
                write!(f, "{} connection failed after {} attempts", stage, attempts)
            }
            Error::CapacityExceeded => write!(f, "Callback registry is full"),
            Error::TopicTooLong => write!(f, "Topic too long"),
            Error::PayloadTooLarge => write!(f, "Payload too large"),
            Error::InvalidIdentity => write!(f, "Invalid device identity"),
            Error::HandlerRequired => write!(f, "Inbound entity requires a handler"),
            Error::InvalidConfig => write!(f, "Invalid configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Stage {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Stage::Network => defmt::write!(f, "Network"),
            Stage::Broker => defmt::write!(f, "Broker"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::RetriesExhausted { stage, attempts } => {
                defmt::write!(f, "RetriesExhausted({}, {})", stage, attempts)
            }
            Error::CapacityExceeded => defmt::write!(f, "CapacityExceeded"),
            Error::TopicTooLong => defmt::write!(f, "TopicTooLong"),
            Error::PayloadTooLarge => defmt::write!(f, "PayloadTooLarge"),
            Error::InvalidIdentity => defmt::write!(f, "InvalidIdentity"),
            Error::HandlerRequired => defmt::write!(f, "HandlerRequired"),
            Error::InvalidConfig => defmt::write!(f, "InvalidConfig"),
        }
    }
}
