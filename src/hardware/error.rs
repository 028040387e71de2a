//! Collaborator error types and recovery handling

use std::time::Duration;
use thiserror::Error;

/// Failures of the wireless link to the weight sensor
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinkError {
    /// Discovery did not complete in time
    #[error("discovery timed out after {}ms", .timeout.as_millis())]
    DiscoveryTimeout { timeout: Duration },
    /// Discovery primitive reported an error
    #[error("discovery failed: {details}")]
    DiscoveryFailed { details: String },
    /// Scan finished without the target address
    #[error("device {address} not found")]
    DeviceNotFound { address: String },
    /// Connection attempt did not complete in time
    #[error("connection to {address} timed out after {}ms", .timeout.as_millis())]
    ConnectTimeout { address: String, timeout: Duration },
    /// Connection attempt was rejected
    #[error("connection to {address} failed: {details}")]
    ConnectFailed { address: String, details: String },
    /// Notification subscription was rejected
    #[error("subscription to {channel} failed: {details}")]
    SubscribeFailed { channel: String, details: String },
    /// Peer dropped an established connection
    #[error("connection to {address} lost")]
    ConnectionLost { address: String },
}

/// Result type for link operations
pub type LinkResult<T> = Result<T, LinkError>;

/// Recovery edge taken after a link failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Wait one backoff interval and scan again
    Rescan,
    /// Tear the connection down, reset state, then scan again
    ResetAndRetry,
}

impl LinkError {
    /// Get the recovery edge for this failure
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            LinkError::DeviceNotFound { .. } => RecoveryStrategy::Rescan,
            LinkError::DiscoveryTimeout { .. }
            | LinkError::DiscoveryFailed { .. }
            | LinkError::ConnectTimeout { .. }
            | LinkError::ConnectFailed { .. }
            | LinkError::SubscribeFailed { .. }
            | LinkError::ConnectionLost { .. } => RecoveryStrategy::ResetAndRetry,
        }
    }
}

/// Failures of the frame source
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    /// No frame ready this time; try again next iteration
    #[error("frame unavailable: {details}")]
    Unavailable { details: String },
    /// Source has no more frames
    #[error("frame source exhausted")]
    Exhausted,
    /// Camera device failed
    #[error("camera error {code}: {description}")]
    Device { code: u32, description: String },
}

/// Result type for frame acquisition
pub type FrameResult<T> = Result<T, FrameError>;

impl FrameError {
    /// Unavailable frames are skipped; everything else ends sensing
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FrameError::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_recovery_strategies() {
        let not_found = LinkError::DeviceNotFound {
            address: "40:4C:CA:41:4E:0E".to_string(),
        };
        assert_eq!(not_found.recovery_strategy(), RecoveryStrategy::Rescan);

        let lost = LinkError::ConnectionLost {
            address: "40:4C:CA:41:4E:0E".to_string(),
        };
        assert_eq!(lost.recovery_strategy(), RecoveryStrategy::ResetAndRetry);
    }

    #[test]
    fn test_link_error_display() {
        let err = LinkError::ConnectTimeout {
            address: "AA:BB:CC:DD:EE:FF".to_string(),
            timeout: Duration::from_secs(10),
        };
        assert_eq!(err.to_string(), "connection to AA:BB:CC:DD:EE:FF timed out after 10000ms");
    }

    #[test]
    fn test_frame_error_recoverability() {
        assert!(FrameError::Unavailable { details: "busy".to_string() }.is_recoverable());
        assert!(!FrameError::Exhausted.is_recoverable());
        assert!(!FrameError::Device { code: 5, description: "unplugged".to_string() }.is_recoverable());
    }
}
