//! Error types for the MinIO provisioner
//!
//! Provides structured error types for the provisioning core and the
//! controller wiring, plus the requeue action each error maps to.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the provisioner
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    // =========================================================================
    // Claim / Descriptor Errors
    // =========================================================================
    #[error("required annotation {annotation} is missing or empty")]
    MissingAnnotation { annotation: String },

    #[error("unsupported claim feature: {0}")]
    UnsupportedFeature(String),

    // =========================================================================
    // Backing Store Errors
    // =========================================================================
    #[error("s3 {operation} for bucket {bucket} failed: {output}")]
    BackingStore {
        operation: String,
        bucket: String,
        output: String,
    },

    // =========================================================================
    // Ownership
    // =========================================================================
    /// Delete was invoked on a volume some other instance provisioned.
    /// A no-op signal, neither success nor hard failure.
    #[error("volume ignored: {reason}")]
    Ignored { reason: String },

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    // =========================================================================
    // Bootstrap Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Action to take on error during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    /// Determine what action the controller should take for this error.
    /// The core never retries on its own; retry pacing belongs to the
    /// reconciliation runtime.
    pub fn action(&self) -> ErrorAction {
        match self {
            // Transient errors - retry with backoff
            Error::Kube(_) | Error::Io(_) | Error::Internal(_) => ErrorAction::RequeueWithBackoff,

            // The storage client surfaces transient and permanent failures
            // alike; requeue on a fixed cadence and let the store decide
            Error::BackingStore { .. } => ErrorAction::RequeueAfter(Duration::from_secs(15)),

            // The claim or descriptor itself must change first
            Error::MissingAnnotation { .. }
            | Error::UnsupportedFeature(_)
            | Error::Configuration(_) => ErrorAction::NoRequeue,

            // Another instance owns the volume
            Error::Ignored { .. } => ErrorAction::NoRequeue,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }

    /// Check if this is the intentional-skip outcome of a delete
    pub fn is_ignored(&self) -> bool {
        matches!(self, Error::Ignored { .. })
    }
}

/// Result type alias for the provisioner
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_actions() {
        let err = Error::BackingStore {
            operation: "mb".into(),
            bucket: "b".into(),
            output: "connection refused".into(),
        };
        assert_eq!(
            err.action(),
            ErrorAction::RequeueAfter(Duration::from_secs(15))
        );

        let err = Error::MissingAnnotation {
            annotation: "volume.kubernetes.io/minio-pv-name".into(),
        };
        assert_eq!(err.action(), ErrorAction::NoRequeue);

        let err = Error::UnsupportedFeature("claim.spec.selector".into());
        assert_eq!(err.action(), ErrorAction::NoRequeue);
    }

    #[test]
    fn test_error_retryable() {
        let store = Error::BackingStore {
            operation: "rb".into(),
            bucket: "b".into(),
            output: "timeout".into(),
        };
        assert!(store.is_retryable());
        assert!(!store.is_ignored());

        let ignored = Error::Ignored {
            reason: "provisioned by inst-2".into(),
        };
        assert!(!ignored.is_retryable());
        assert!(ignored.is_ignored());
    }
}
