//! Inbound message routing.

use heapless::String;

use super::registry::{CallbackRegistry, TopicHandler};
use crate::network::application::mqtt::MAX_PAYLOAD_LEN;

/// Room for a fully Latin-1 decoded payload of [`MAX_PAYLOAD_LEN`] bytes.
pub const DECODED_PAYLOAD_LEN: usize = 2 * MAX_PAYLOAD_LEN;

/// Routes raw inbound broker messages to the handlers of a registry.
#[derive(Debug)]
pub struct MessageDispatcher<'r, H, const N: usize> {
    registry: &'r mut CallbackRegistry<H, N>,
}

impl<'r, H: TopicHandler, const N: usize> MessageDispatcher<'r, H, N> {
    /// Dispatch into `registry`.
    pub fn new(registry: &'r mut CallbackRegistry<H, N>) -> Self {
        Self { registry }
    }

    /// Decode `bytes` and hand them to the handler registered for `topic`.
    ///
    /// Returns whether a handler ran. Payloads that cannot be decoded into
    /// [`DECODED_PAYLOAD_LEN`] bytes are dropped. Anything the MQTT client
    /// delivers fits; longer non UTF-8 input from other callers does not.
    pub fn on_message(&mut self, topic: &str, bytes: &[u8]) -> bool {
        let mut scratch: String<DECODED_PAYLOAD_LEN> = String::new();
        let Some(payload) = decode_payload(bytes, &mut scratch) else {
            warn!("dropping oversized payload on {}", topic);
            return false;
        };

        debug!("message arrived [{}] {}", topic, payload);

        let handled = self.registry.dispatch(topic, payload);
        if !handled {
            trace!("no handler for {}", topic);
        }
        handled
    }
}

/// Interpret raw payload bytes as text without rejecting anything.
///
/// Valid UTF-8 is borrowed as is. Anything else is decoded one char per byte
/// as Latin-1 into `scratch`; `None` means `scratch` was too small.
///
/// ```rust
/// use heapless::String;
/// use hamqtt::homeassistant::decode_payload;
///
/// let mut scratch: String<8> = String::new();
/// assert_eq!(decode_payload(b"21.5", &mut scratch), Some("21.5"));
/// assert_eq!(decode_payload(&[0x32, 0xB0], &mut scratch), Some("2°"));
/// ```
pub fn decode_payload<'b, const M: usize>(
    bytes: &'b [u8],
    scratch: &'b mut String<M>,
) -> Option<&'b str> {
    match core::str::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(_) => {
            scratch.clear();
            for &byte in bytes {
                scratch.push(char::from(byte)).ok()?;
            }
            Some(scratch.as_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::homeassistant::registry::FnHandler;
    use core::cell::{Cell, RefCell};

    #[test]
    fn utf8_is_passed_through() {
        let mut scratch: String<4> = String::new();
        assert_eq!(decode_payload("héllo wörld".as_bytes(), &mut scratch), Some("héllo wörld"));
    }

    #[test]
    fn invalid_utf8_decodes_bytewise() {
        let mut scratch: String<16> = String::new();
        assert_eq!(decode_payload(&[b'a', 0xFF, b'b'], &mut scratch), Some("aÿb"));
    }

    #[test]
    fn scratch_overflow_is_reported() {
        let mut scratch: String<2> = String::new();
        assert_eq!(decode_payload(&[0xE9, 0xE9], &mut scratch), None);
    }

    #[test]
    fn routes_decoded_payload() {
        let seen: RefCell<String<32>> = RefCell::new(String::new());
        let record = |payload: &str| {
            let mut seen = seen.borrow_mut();
            seen.clear();
            let _ = seen.push_str(payload);
        };

        let mut registry: CallbackRegistry<_, 2> = CallbackRegistry::new();
        registry.add("dev/in/state", FnHandler(record)).unwrap();

        let mut dispatcher = MessageDispatcher::new(&mut registry);
        assert!(dispatcher.on_message("dev/in/state", b"ON"));
        assert!(!dispatcher.on_message("dev/other", b"OFF"));
        drop(dispatcher);
        drop(registry);

        assert_eq!(seen.borrow().as_str(), "ON");
    }

    #[test]
    fn largest_latin1_payload_is_routed() {
        let hits = Cell::new(0);
        let mut registry: CallbackRegistry<_, 1> = CallbackRegistry::new();
        registry
            .add("dev/in/state", FnHandler(|payload: &str| {
                assert_eq!(payload.len(), DECODED_PAYLOAD_LEN);
                hits.set(hits.get() + 1);
            }))
            .unwrap();

        let mut dispatcher = MessageDispatcher::new(&mut registry);
        assert!(dispatcher.on_message("dev/in/state", &[0xE9; MAX_PAYLOAD_LEN]));
        drop(dispatcher);
        drop(registry);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn payload_past_decode_buffer_is_dropped() {
        let hits = Cell::new(0);
        let mut registry: CallbackRegistry<_, 1> = CallbackRegistry::new();
        registry
            .add("dev/in/state", FnHandler(|_: &str| hits.set(hits.get() + 1)))
            .unwrap();

        let mut dispatcher = MessageDispatcher::new(&mut registry);
        assert!(!dispatcher.on_message("dev/in/state", &[0xE9; MAX_PAYLOAD_LEN + 1]));
        drop(dispatcher);
        drop(registry);
        assert_eq!(hits.get(), 0);
    }
}
