//! Domain Ports - Core trait definitions for the provisioner
//!
//! These traits define the boundaries between the provisioning logic and
//! external systems. The reconciliation runtime calls into [`Provisioner`];
//! the provisioner calls out through [`BucketClient`].

use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use std::sync::Arc;

// =============================================================================
// Volume Options
// =============================================================================

/// Per-provision inputs owned by the caller: the volume name the controller
/// pre-allocated for the claim, plus storage-class-level settings.
#[derive(Debug, Clone, Default)]
pub struct VolumeOptions {
    /// Pre-allocated name for the volume, used as the bucket-name fallback
    /// when the claim carries no path annotation
    pub pv_name: String,
    /// Reclaim policy for the provisioned volume (e.g. "Delete")
    pub reclaim_policy: Option<String>,
    /// Mount options from the storage class. When set, these take precedence
    /// and the legacy per-volume mount-options annotation is suppressed
    pub class_mount_options: Option<Vec<String>>,
}

// =============================================================================
// Provisioner Port
// =============================================================================

/// Port implemented by the provisioning core and driven by the
/// reconciliation runtime.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Whether provisioning should be attempted for the given claim.
    /// No side effects.
    fn should_provision(&self, claim: &PersistentVolumeClaim) -> bool;

    /// Create the backing storage asset and return a volume descriptor
    /// for it.
    async fn provision(
        &self,
        claim: &PersistentVolumeClaim,
        options: &VolumeOptions,
    ) -> Result<PersistentVolume>;

    /// Remove the storage asset backing a volume this instance provisioned.
    async fn delete(&self, volume: &PersistentVolume) -> Result<()>;
}

// =============================================================================
// Bucket Client Port
// =============================================================================

/// Port for the backing object store. Create and remove are the only
/// operations the provisioner needs; there is no listing, existence check,
/// or ACL management.
#[async_trait]
pub trait BucketClient: Send + Sync {
    /// Create a bucket with the given name
    async fn create_bucket(&self, name: &str) -> Result<()>;

    /// Remove the bucket with the given name
    async fn delete_bucket(&self, name: &str) -> Result<()>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type ProvisionerRef = Arc<dyn Provisioner>;
pub type BucketClientRef = Arc<dyn BucketClient>;
