//! Maps `Box<dyn Error>` from the transport boundary to a typed `ScaleError`.
//!
//! `miscale_traits::Transport` returns boxed errors so adapters can use their own
//! error types; this module converts them to our typed error enum, with an
//! optional feature-gated path for `miscale_hardware::HwError` downcasting.

use crate::error::ScaleError;

/// Map a transport-boundary error to a typed `ScaleError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_transport_error(e: &(dyn std::error::Error + 'static)) -> ScaleError {
    #[cfg(feature = "hardware-errors")]
    {
        use miscale_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => ScaleError::Timeout,
                other => ScaleError::TransportFailure(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") || s.to_lowercase().contains("timed out") {
        ScaleError::Timeout
    } else {
        ScaleError::TransportFailure(s)
    }
}
