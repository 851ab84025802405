//! Maps `Box<dyn Error>` from trait boundaries to typed `SorterError`.
//!
//! The traits in `sorter_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `sorter_hardware::HwError` downcasting.

use sorter_traits::HwResult;

use crate::error::{Result, SorterError};

/// Map a trait-boundary error to a typed `SorterError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> SorterError {
    #[cfg(feature = "hardware-errors")]
    {
        use sorter_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout | HwError::DataReadyTimeout => SorterError::Timeout,
                other => SorterError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        SorterError::Timeout
    } else {
        SorterError::Hardware(s)
    }
}

/// Lift a trait-boundary result into the crate's `eyre` result.
pub(crate) fn lift<T>(res: HwResult<T>) -> Result<T> {
    res.map_err(|e| eyre::Report::new(map_hw_error(&*e)))
}
