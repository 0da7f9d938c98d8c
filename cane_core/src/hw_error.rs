//! Maps `Box<dyn Error>` from trait boundaries to typed `CaneError`.
//!
//! The traits in `cane_traits` use `Box<dyn Error + Send + Sync>` so any
//! transport can plug in; this module converts those to our typed error
//! enum, with an optional feature-gated path for `cane_hardware::HwError`
//! downcasting.

use crate::error::CaneError;

/// Map a trait-boundary error to a typed `CaneError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> CaneError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<cane_hardware::HwError>() {
            return match hw {
                cane_hardware::HwError::Timeout => CaneError::ReadTimeout,
                cane_hardware::HwError::Open { .. } => CaneError::LinkUnavailable(hw.to_string()),
                other => CaneError::HardwareFault(other.to_string()),
            };
        }
    }

    if let Some(io) = e.downcast_ref::<std::io::Error>() {
        return match io.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => CaneError::ReadTimeout,
            _ => CaneError::Hardware(io.to_string()),
        };
    }

    // Fallback: string-based detection
    let s = e.to_string();
    if s.to_lowercase().contains("timed out") || s.to_lowercase().contains("timeout") {
        CaneError::ReadTimeout
    } else {
        CaneError::Hardware(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_timeout_is_read_timeout() {
        let e = std::io::Error::new(std::io::ErrorKind::TimedOut, "x");
        assert_eq!(map_hw_error(&e), CaneError::ReadTimeout);
    }

    #[test]
    fn unknown_errors_fall_back_to_strings() {
        let e = std::io::Error::other("operation timed out");
        // io::Error with kind Other goes through the io branch first
        assert!(matches!(map_hw_error(&e), CaneError::Hardware(_)));

        #[derive(Debug)]
        struct Opaque;
        impl std::fmt::Display for Opaque {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "device read timeout")
            }
        }
        impl std::error::Error for Opaque {}
        assert_eq!(map_hw_error(&Opaque), CaneError::ReadTimeout);
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hw_errors_downcast() {
        assert_eq!(
            map_hw_error(&cane_hardware::HwError::Timeout),
            CaneError::ReadTimeout
        );
        assert!(matches!(
            map_hw_error(&cane_hardware::HwError::Disconnected),
            CaneError::HardwareFault(_)
        ));
    }
}
