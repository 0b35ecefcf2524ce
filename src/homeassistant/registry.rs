//! Topic-to-handler registry.

use heapless::Vec;

use super::error::Error;
use super::topic::Topic;

/// Registry capacity used when none is given.
pub const DEFAULT_CAPACITY: usize = 10;

/// Something that consumes inbound payloads for one topic.
///
/// Handlers run synchronously inside the session's service call, so they
/// should return quickly.
pub trait TopicHandler {
    /// Handle one decoded payload.
    fn handle(&mut self, payload: &str);
}

impl<T: TopicHandler + ?Sized> TopicHandler for &mut T {
    fn handle(&mut self, payload: &str) {
        (**self).handle(payload)
    }
}

/// Adapts a closure into a [`TopicHandler`].
///
/// ```rust
/// use hamqtt::homeassistant::{FnHandler, TopicHandler};
///
/// let mut last = None;
/// let mut handler = FnHandler(|payload: &str| last = payload.parse::<f32>().ok());
/// handler.handle("21.5");
/// drop(handler);
/// assert_eq!(last, Some(21.5));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FnHandler<F>(pub F);

impl<F: FnMut(&str)> TopicHandler for FnHandler<F> {
    fn handle(&mut self, payload: &str) {
        (self.0)(payload)
    }
}

/// One `(topic, handler)` pair.
#[derive(Debug)]
pub struct Registration<H> {
    /// Exact topic the handler listens on.
    pub topic: Topic,
    /// The handler.
    pub handler: H,
}

/// Insertion-ordered registrations with a fixed capacity of `N`.
///
/// Registrations are never removed. Dispatch goes to the first registration
/// whose topic equals the inbound topic exactly.
#[derive(Debug)]
pub struct CallbackRegistry<H, const N: usize = DEFAULT_CAPACITY> {
    registrations: Vec<Registration<H>, N>,
}

impl<H: TopicHandler, const N: usize> CallbackRegistry<H, N> {
    /// Create an empty registry
    pub const fn new() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    /// Append a registration.
    ///
    /// # Errors
    ///
    /// * [`Error::CapacityExceeded`] - All `N` slots are taken; nothing changes
    /// * [`Error::TopicTooLong`] - `topic` does not fit a [`Topic`]
    pub fn add(&mut self, topic: &str, handler: H) -> Result<(), Error> {
        if self.is_full() {
            return Err(Error::CapacityExceeded);
        }
        let topic = Topic::try_from(topic).map_err(|_| Error::TopicTooLong)?;
        self.registrations
            .push(Registration { topic, handler })
            .map_err(|_| Error::CapacityExceeded)
    }

    /// Deliver `payload` to the first handler registered for exactly `topic`.
    ///
    /// Returns whether a handler ran. An unmatched topic is not an error.
    pub fn dispatch(&mut self, topic: &str, payload: &str) -> bool {
        match self
            .registrations
            .iter_mut()
            .find(|registration| registration.topic == topic)
        {
            Some(registration) => {
                registration.handler.handle(payload);
                true
            }
            None => false,
        }
    }

    /// Registered topics in insertion order.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.registrations.iter().map(|r| r.topic.as_str())
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Whether another [`add`](Self::add) would fail.
    pub fn is_full(&self) -> bool {
        self.registrations.is_full()
    }

    /// Maximum number of registrations.
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<H: TopicHandler, const N: usize> Default for CallbackRegistry<H, N> {
    fn default() -> Self {
        Self::new()
    }
}
