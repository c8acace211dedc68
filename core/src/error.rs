//! Error taxonomy for the permission-gated scan flow.

use crate::capability::PermissionGroup;
use thiserror::Error;

/// Errors surfaced by the gate, the discovery session and the controller.
///
/// Every variant is recoverable by a state transition except
/// [`ScanError::RadioUnavailable`], which ends the current run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// One or more groups were denied; a rationale prompt is pending.
    #[error("Permission denied for {groups:?}")]
    PermissionDenied { groups: Vec<PermissionGroup> },

    /// Repeated denials; only the app settings page can recover.
    #[error("Permission permanently denied for {group}")]
    PermissionPermanentlyDenied { group: PermissionGroup },

    #[error("No radio available on this host")]
    RadioUnavailable,

    #[error("Radio is disabled")]
    RadioDisabled,

    #[error("Radio could not be enabled")]
    RadioEnableFailed,

    /// Name lookup for a single sighting was not authorized.
    #[error("Sighting details unauthorized for device {0}")]
    SightingDeliveryUnauthorized(String),

    #[error("Platform bridge error: {0}")]
    Platform(String),

    #[error("Controller in invalid state: {0}")]
    InvalidState(String),

    /// A pending wait was interrupted by `stop()`.
    #[error("Operation cancelled")]
    Cancelled,
}

impl ScanError {
    /// Whether the run can continue after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ScanError::RadioUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_missing_radio_is_fatal() {
        assert!(!ScanError::RadioUnavailable.is_recoverable());
        assert!(ScanError::RadioDisabled.is_recoverable());
        assert!(ScanError::RadioEnableFailed.is_recoverable());
        assert!(ScanError::PermissionPermanentlyDenied {
            group: PermissionGroup::Radio
        }
        .is_recoverable());
    }

    #[test]
    fn test_error_messages() {
        let err = ScanError::PermissionPermanentlyDenied {
            group: PermissionGroup::Location,
        };
        assert_eq!(err.to_string(), "Permission permanently denied for location");
        assert_eq!(
            ScanError::SightingDeliveryUnauthorized("AA:BB".to_string()).to_string(),
            "Sighting details unauthorized for device AA:BB"
        );
    }
}
