//! Provision Handler
//!
//! Admission, claim validation, bucket creation, and descriptor
//! construction.

use crate::domain::ports::VolumeOptions;
use crate::error::{Error, Result};
use crate::volume::{
    claim_annotation, MinioProvisioner, ANN_CREATED_BY, ANN_MINIO_KEY, ANN_MINIO_URL,
    ANN_MOUNT_OPTIONS, ANN_PROVISIONER, ANN_PROVISIONER_ID, ANN_PV_NAME, ANN_PV_PATH,
    CREATED_BY, CSI_DRIVER,
};
use k8s_openapi::api::core::v1::{
    CSIPersistentVolumeSource, PersistentVolume, PersistentVolumeClaim, PersistentVolumeSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use tracing::info;

/// The storage asset created for one claim
struct MinioVolume {
    /// Normalized bucket name
    bucket: String,
    /// Per-volume mount options; recorded on the descriptor only when the
    /// storage class carries none of its own
    mount_options: Option<String>,
}

impl MinioProvisioner {
    /// Returns whether provisioning should be attempted for the given claim:
    /// true iff the claim names this instance's configured provisioner.
    pub fn should_provision(&self, claim: &PersistentVolumeClaim) -> bool {
        claim_annotation(claim, ANN_PROVISIONER) == Some(self.config.provisioner_name.as_str())
    }

    /// Create the backing bucket and return a PV descriptor for it.
    ///
    /// Not idempotent: a repeated call for the same claim issues a second
    /// bucket creation; duplicate-create semantics belong to the backing
    /// store. No rollback is attempted on failure.
    pub async fn provision(
        &self,
        claim: &PersistentVolumeClaim,
        options: &VolumeOptions,
    ) -> Result<PersistentVolume> {
        // Fail fast on both required annotations before any external call
        let pv_name = claim_annotation(claim, ANN_PV_NAME).ok_or_else(|| {
            Error::MissingAnnotation {
                annotation: ANN_PV_NAME.to_string(),
            }
        })?;

        if claim_annotation(claim, ANN_PV_PATH).is_none() {
            return Err(Error::MissingAnnotation {
                annotation: ANN_PV_PATH.to_string(),
            });
        }

        let volume = self.create_volume(claim, options).await?;

        info!(
            "provisioned bucket {} for claim {}/{}",
            volume.bucket,
            claim.metadata.namespace.as_deref().unwrap_or_default(),
            claim.metadata.name.as_deref().unwrap_or_default(),
        );

        Ok(self.build_pv(claim, options, pv_name, &volume))
    }

    /// Reject claim features bucket creation cannot honor
    fn validate_options(&self, claim: &PersistentVolumeClaim) -> Result<()> {
        if claim.spec.as_ref().and_then(|s| s.selector.as_ref()).is_some() {
            return Err(Error::UnsupportedFeature(
                "claim.spec.selector is not supported".to_string(),
            ));
        }
        Ok(())
    }

    /// Create the storage asset: validate the claim, resolve the bucket
    /// name, and create the bucket through the client.
    async fn create_volume(
        &self,
        claim: &PersistentVolumeClaim,
        options: &VolumeOptions,
    ) -> Result<MinioVolume> {
        self.validate_options(claim)?;

        let bucket = resolve_bucket_name(claim, options);
        self.buckets.create_bucket(&bucket).await?;

        Ok(MinioVolume {
            bucket,
            mount_options: None,
        })
    }

    /// Build the PV descriptor for a created volume
    fn build_pv(
        &self,
        claim: &PersistentVolumeClaim,
        options: &VolumeOptions,
        pv_name: &str,
        volume: &MinioVolume,
    ) -> PersistentVolume {
        let mut annotations = BTreeMap::new();
        annotations.insert(ANN_CREATED_BY.to_string(), CREATED_BY.to_string());

        // Legacy mount-options annotation only when the storage class
        // carries no mount options of its own
        if let Some(mount_options) = volume.mount_options.as_deref() {
            if !mount_options.is_empty() && options.class_mount_options.is_none() {
                annotations.insert(ANN_MOUNT_OPTIONS.to_string(), mount_options.to_string());
            }
        }

        annotations.insert(
            ANN_PROVISIONER_ID.to_string(),
            self.config.identity.clone(),
        );
        annotations.insert(ANN_PV_PATH.to_string(), volume.bucket.clone());
        annotations.insert(ANN_MINIO_KEY.to_string(), self.config.minio_key.clone());
        annotations.insert(ANN_MINIO_URL.to_string(), self.config.minio_url.clone());

        let mut capacity = BTreeMap::new();
        if let Some(request) = claim
            .spec
            .as_ref()
            .and_then(|s| s.resources.as_ref())
            .and_then(|r| r.requests.as_ref())
            .and_then(|r| r.get("storage"))
        {
            capacity.insert("storage".to_string(), request.clone());
        }

        let mut volume_attributes = BTreeMap::new();
        volume_attributes.insert("BucketName".to_string(), volume.bucket.clone());
        volume_attributes.insert("MinioKey".to_string(), self.config.minio_key.clone());
        volume_attributes.insert("MinioURL".to_string(), self.config.minio_url.clone());

        PersistentVolume {
            metadata: ObjectMeta {
                name: Some(pv_name.to_string()),
                labels: Some(BTreeMap::new()),
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: Some(PersistentVolumeSpec {
                persistent_volume_reclaim_policy: options.reclaim_policy.clone(),
                access_modes: claim.spec.as_ref().and_then(|s| s.access_modes.clone()),
                capacity: Some(capacity),
                csi: Some(CSIPersistentVolumeSource {
                    driver: CSI_DRIVER.to_string(),
                    read_only: Some(false),
                    fs_type: Some("s3fs".to_string()),
                    volume_handle: volume.bucket.clone(),
                    volume_attributes: Some(volume_attributes),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Resolve the bucket name for a claim: the path annotation when present,
/// otherwise the pre-allocated volume name. Bucket names are flat, so every
/// path separator becomes a dash.
fn resolve_bucket_name(claim: &PersistentVolumeClaim, options: &VolumeOptions) -> String {
    claim_annotation(claim, ANN_PV_PATH)
        .unwrap_or(&options.pv_name)
        .replace('/', "-")
}
