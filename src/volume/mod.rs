//! Volume provisioning core
//!
//! The thin callback logic driven by the reconciliation runtime: admission
//! ([`MinioProvisioner::should_provision`]), bucket creation plus descriptor
//! construction (`provision`), and provenance-checked teardown (`delete`).
//!
//! The annotation constants below are the wire format between this core and
//! the orchestration layer.

pub mod delete;
pub mod provision;

use crate::domain::ports::{BucketClientRef, Provisioner, VolumeOptions};
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};

// =============================================================================
// Annotation Schema
// =============================================================================

/// Marker identifying this system as the creator of a volume
pub const ANN_CREATED_BY: &str = "kubernetes.io/createdby";
/// Value stored under [`ANN_CREATED_BY`]
pub const CREATED_BY: &str = "minio-dynamic-provisioner";

/// Legacy PV annotation holding a comma separated list of mount options.
/// Suppressed entirely when the storage class carries its own mount options.
pub const ANN_MOUNT_OPTIONS: &str = "volume.beta.kubernetes.io/mount-options";

/// Identity of the provisioner instance that created a volume; the sole
/// ownership check consulted at delete time
pub const ANN_PROVISIONER_ID: &str = "minio.io/provisioner-identity";

/// Claim-side annotation naming the provisioner that should act on it
pub const ANN_PROVISIONER: &str = "volume.kubernetes.io/provisioner";

/// Claim-side annotation requesting a volume name
pub const ANN_PV_NAME: &str = "volume.kubernetes.io/minio-pv-name";

/// Claim-side annotation requesting a bucket name (before normalization);
/// on provisioned volumes, the resolved bucket name
pub const ANN_PV_PATH: &str = "volume.kubernetes.io/minio-pv-path";

/// Access credential for the MinIO server backing a volume
pub const ANN_MINIO_KEY: &str = "volume.kubernetes.io/minio-keys";

/// Endpoint URL of the MinIO server backing a volume
pub const ANN_MINIO_URL: &str = "volume.kubernetes.io/minio-url";

/// CSI driver that mounts the provisioned buckets
pub const CSI_DRIVER: &str = "s3fs.csi.minio.com";

// =============================================================================
// Configuration
// =============================================================================

/// Immutable configuration supplied once at construction. Never read from
/// ambient process state after that.
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// Name claims must request for this instance to act on them
    pub provisioner_name: String,
    /// Identity stamped on provisioned volumes and checked at delete time
    pub identity: String,
    /// MinIO endpoint URL recorded on provisioned volumes
    pub minio_url: String,
    /// MinIO access credential recorded on provisioned volumes
    pub minio_key: String,
}

impl ProvisionerConfig {
    /// Validate the bootstrap inputs: the provisioner name must be a
    /// qualified name and the credential must be present.
    pub fn validate(&self) -> Result<()> {
        let name = &self.provisioner_name;
        if name.is_empty() {
            return Err(Error::Configuration(
                "provisioner name must not be empty".to_string(),
            ));
        }
        if name.len() > 253 {
            return Err(Error::Configuration(format!(
                "provisioner name {:?} exceeds 253 characters",
                name
            )));
        }
        let charset_ok = name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '/'));
        let ends_ok = name.starts_with(|c: char| c.is_ascii_alphanumeric())
            && name.ends_with(|c: char| c.is_ascii_alphanumeric());
        if !charset_ok || !ends_ok {
            return Err(Error::Configuration(format!(
                "provisioner name {:?} is not a qualified name",
                name
            )));
        }

        if self.minio_key.is_empty() {
            return Err(Error::Configuration(
                "minio key must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Provisioner
// =============================================================================

/// Dynamic provisioner for MinIO-backed s3fs volumes
pub struct MinioProvisioner {
    pub(crate) config: ProvisionerConfig,
    pub(crate) buckets: BucketClientRef,
}

impl MinioProvisioner {
    /// Create a provisioner from its immutable configuration and a bucket
    /// client
    pub fn new(config: ProvisionerConfig, buckets: BucketClientRef) -> Self {
        Self { config, buckets }
    }
}

#[async_trait]
impl Provisioner for MinioProvisioner {
    fn should_provision(&self, claim: &PersistentVolumeClaim) -> bool {
        MinioProvisioner::should_provision(self, claim)
    }

    async fn provision(
        &self,
        claim: &PersistentVolumeClaim,
        options: &VolumeOptions,
    ) -> Result<PersistentVolume> {
        MinioProvisioner::provision(self, claim, options).await
    }

    async fn delete(&self, volume: &PersistentVolume) -> Result<()> {
        MinioProvisioner::delete(self, volume).await
    }
}

// =============================================================================
// Annotation Access
// =============================================================================

/// Read a claim annotation, treating an empty value as absent
pub(crate) fn claim_annotation<'a>(
    claim: &'a PersistentVolumeClaim,
    key: &str,
) -> Option<&'a str> {
    claim
        .metadata
        .annotations
        .as_ref()
        .and_then(|anns| anns.get(key))
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// Read a volume annotation, treating an empty value as absent
pub(crate) fn volume_annotation<'a>(volume: &'a PersistentVolume, key: &str) -> Option<&'a str> {
    volume
        .metadata
        .annotations
        .as_ref()
        .and_then(|anns| anns.get(key))
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_config_validation() {
        let valid = testutil::config();
        assert!(valid.validate().is_ok());

        let mut empty_name = testutil::config();
        empty_name.provisioner_name = String::new();
        assert_matches!(empty_name.validate(), Err(Error::Configuration(_)));

        let mut bad_charset = testutil::config();
        bad_charset.provisioner_name = "s3fs minio".to_string();
        assert_matches!(bad_charset.validate(), Err(Error::Configuration(_)));

        let mut dangling = testutil::config();
        dangling.provisioner_name = "s3fs.minio.com.".to_string();
        assert_matches!(dangling.validate(), Err(Error::Configuration(_)));

        let mut no_key = testutil::config();
        no_key.minio_key = String::new();
        assert_matches!(no_key.validate(), Err(Error::Configuration(_)));
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================
