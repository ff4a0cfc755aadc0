pub mod clock;
pub mod frame;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// Boxed error used at the trait boundary so adapters can surface their own error types.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Source of raw measurement notifications from a scale.
///
/// A transport is owned by exactly one session. `connect` runs discovery (when no
/// target is given) plus connect/subscribe, `next_payload` blocks for at most
/// `timeout` waiting for the next notification, and `stop` releases the device.
pub trait Transport {
    /// Connect to `target`, or discover a device when `None`. Returns the device identifier.
    fn connect(&mut self, target: Option<&str>) -> Result<String, TransportError>;

    /// Next raw notification payload. `Ok(None)` means nothing arrived within `timeout`.
    /// Any `Err` is terminal for the session.
    fn next_payload(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError>;

    /// Stop producing payloads and disconnect. Must be safe to call more than once.
    fn stop(&mut self) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self, target: Option<&str>) -> Result<String, TransportError> {
        (**self).connect(target)
    }

    fn next_payload(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError> {
        (**self).next_payload(timeout)
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        (**self).stop()
    }
}
