//! Device configuration.
//!
//! A single [`DeviceConfig`] value carries everything needed to bring a device
//! online. It borrows its strings, so it can live in a `const`, or be parsed
//! zero-copy from a JSON document kept in flash with
//! [`DeviceConfig::from_json`].

use serde::Deserialize;

use super::error::Error;
use crate::network::application::mqtt::BrokerConfig;

/// Interval between attempts when nothing else is configured.
pub const DEFAULT_RETRY_INTERVAL_MS: u32 = 2000;

/// Attempts made by [`RetryPolicy::default`] before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Wireless network credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct NetworkConfig<'a> {
    /// Network name.
    pub ssid: &'a str,
    /// Network passphrase.
    pub password: &'a str,
}

impl<'a> NetworkConfig<'a> {
    /// Credentials for network `ssid`.
    pub const fn new(ssid: &'a str, password: &'a str) -> Self {
        Self { ssid, password }
    }
}

/// How often and how long to retry a connection stage.
///
/// The delay after the `n`-th failed attempt is
/// `initial_delay_ms * backoff_multiplier^(n - 1)`, capped at `max_delay_ms`.
/// A multiplier of 1 gives a fixed interval.
///
/// ```rust
/// use hamqtt::homeassistant::RetryPolicy;
///
/// let policy = RetryPolicy::exponential(500, 2, 4000, 10);
/// assert_eq!(policy.delay_for_attempt(1), 500);
/// assert_eq!(policy.delay_for_attempt(3), 2000);
/// assert_eq!(policy.delay_for_attempt(6), 4000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Give up after this many attempts; `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Delay after the first failure.
    pub initial_delay_ms: u32,
    /// Growth factor applied per further failure.
    pub backoff_multiplier: u32,
    /// Upper bound for a single delay.
    pub max_delay_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RETRY_INTERVAL_MS, DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// Fixed `interval_ms` between at most `max_attempts` attempts.
    pub const fn fixed(interval_ms: u32, max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            initial_delay_ms: interval_ms,
            backoff_multiplier: 1,
            max_delay_ms: interval_ms,
        }
    }

    /// Fixed `interval_ms`, never giving up.
    ///
    /// Blocks until the stage succeeds, which only makes sense when the device
    /// has nothing else to do without a network.
    pub const fn unbounded(interval_ms: u32) -> Self {
        Self {
            max_attempts: None,
            initial_delay_ms: interval_ms,
            backoff_multiplier: 1,
            max_delay_ms: interval_ms,
        }
    }

    /// Exponential backoff from `initial_delay_ms`, capped at `max_delay_ms`.
    pub const fn exponential(
        initial_delay_ms: u32,
        backoff_multiplier: u32,
        max_delay_ms: u32,
        max_attempts: u32,
    ) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            initial_delay_ms,
            backoff_multiplier,
            max_delay_ms,
        }
    }

    /// Delay in milliseconds to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> u32 {
        let growth = self
            .backoff_multiplier
            .max(1)
            .saturating_pow(attempt.saturating_sub(1));
        self.initial_delay_ms
            .saturating_mul(growth)
            .min(self.max_delay_ms)
    }

    /// Whether another attempt may follow `attempts_made` failed ones.
    pub fn allows_another(&self, attempts_made: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts_made < max,
            None => true,
        }
    }
}

/// Everything a device session needs to come online.
///
/// # Examples
///
/// ```rust
/// use hamqtt::homeassistant::{DeviceConfig, NetworkConfig};
/// use hamqtt::network::application::mqtt::BrokerConfig;
///
/// const CONFIG: DeviceConfig<'static> = DeviceConfig::new(
///     NetworkConfig::new("home", "wifi-pass"),
///     BrokerConfig::new("192.168.1.10", 1883).with_credentials("mqtt", "secret"),
/// )
/// .with_device_id("greenhouse");
///
/// assert_eq!(CONFIG.device_id, Some("greenhouse"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DeviceConfig<'a> {
    /// Wireless network to join.
    #[serde(borrow)]
    pub network: NetworkConfig<'a>,
    /// Broker to connect to.
    #[serde(borrow)]
    pub broker: BrokerConfig<'a>,
    /// Explicit device identity; derived from the hardware address when absent or empty.
    #[serde(default, borrow)]
    pub device_id: Option<&'a str>,
    /// Retry policy for both connection stages.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl<'a> DeviceConfig<'a> {
    /// Configuration with a derived identity and the default retry policy.
    pub const fn new(network: NetworkConfig<'a>, broker: BrokerConfig<'a>) -> Self {
        Self {
            network,
            broker,
            device_id: None,
            retry: RetryPolicy::fixed(DEFAULT_RETRY_INTERVAL_MS, DEFAULT_MAX_ATTEMPTS),
        }
    }

    /// Set an explicit device identity
    #[must_use]
    pub const fn with_device_id(mut self, device_id: &'a str) -> Self {
        self.device_id = Some(device_id);
        self
    }

    /// Set the retry policy
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Parse a configuration from JSON.
    ///
    /// Strings are borrowed from `json`, so they must not contain escape
    /// sequences.
    pub fn from_json(json: &'a str) -> Result<Self, Error> {
        serde_json_core::from_str::<DeviceConfig<'a>>(json)
            .map(|(config, _)| config)
            .map_err(|_| Error::InvalidConfig)
    }
}
