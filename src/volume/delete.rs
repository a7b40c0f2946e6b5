//! Delete Handler
//!
//! Provenance-checked removal of the bucket backing a released volume.

use crate::error::{Error, Result};
use crate::volume::{volume_annotation, MinioProvisioner, ANN_PROVISIONER_ID, ANN_PV_PATH};
use k8s_openapi::api::core::v1::PersistentVolume;
use tracing::info;

impl MinioProvisioner {
    /// Remove the bucket backing the given volume.
    ///
    /// A volume another instance provisioned is not touched: the call
    /// returns [`Error::Ignored`], which is neither a success nor a hard
    /// failure. The bucket is not checked for emptiness first; a refusal
    /// from the backing store surfaces verbatim.
    pub async fn delete(&self, volume: &PersistentVolume) -> Result<()> {
        let name = volume.metadata.name.as_deref().unwrap_or_default();

        if !self.provisioned(volume)? {
            return Err(Error::Ignored {
                reason: format!(
                    "identity {} didn't provision volume {:?} and so can't delete it; identity {} did and can",
                    self.config.identity,
                    name,
                    volume_annotation(volume, ANN_PROVISIONER_ID).unwrap_or_default(),
                ),
            });
        }

        let bucket = volume_annotation(volume, ANN_PV_PATH).ok_or_else(|| {
            Error::MissingAnnotation {
                annotation: ANN_PV_PATH.to_string(),
            }
        })?;

        self.buckets.delete_bucket(bucket).await?;

        info!("deleted bucket {} backing volume {:?}", bucket, name);
        Ok(())
    }

    /// Whether this instance was the one to provision the volume
    fn provisioned(&self, volume: &PersistentVolume) -> Result<bool> {
        let identity = volume_annotation(volume, ANN_PROVISIONER_ID).ok_or_else(|| {
            Error::MissingAnnotation {
                annotation: ANN_PROVISIONER_ID.to_string(),
            }
        })?;

        Ok(identity == self.config.identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::BucketClient;
    use crate::volume::testutil::{provisioner, volume};
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_delete_owned_volume_removes_bucket() {
        let (p, buckets) = provisioner();
        buckets.create_bucket("team-alpha").await.unwrap();

        let pv = volume(&[
            (ANN_PROVISIONER_ID, "inst-1"),
            (ANN_PV_PATH, "team-alpha"),
        ]);

        p.delete(&pv).await.unwrap();

        assert_eq!(buckets.deleted_calls().await, vec!["team-alpha"]);
        assert!(!buckets.contains("team-alpha").await);
    }

    #[tokio::test]
    async fn test_delete_foreign_volume_is_ignored() {
        let (p, buckets) = provisioner();

        let pv = volume(&[
            (ANN_PROVISIONER_ID, "inst-2"),
            (ANN_PV_PATH, "team-alpha"),
        ]);

        let err = p.delete(&pv).await.unwrap_err();
        assert!(err.is_ignored());
        assert!(!err.is_retryable());
        assert!(buckets.deleted_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_without_identity_annotation() {
        let (p, buckets) = provisioner();

        let pv = volume(&[(ANN_PV_PATH, "team-alpha")]);

        let err = p.delete(&pv).await.unwrap_err();
        assert_matches!(
            err,
            Error::MissingAnnotation { ref annotation } if annotation == ANN_PROVISIONER_ID
        );
        assert!(buckets.deleted_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_without_path_annotation() {
        let (p, buckets) = provisioner();

        let pv = volume(&[(ANN_PROVISIONER_ID, "inst-1")]);

        let err = p.delete(&pv).await.unwrap_err();
        assert_matches!(
            err,
            Error::MissingAnnotation { ref annotation } if annotation == ANN_PV_PATH
        );
        assert!(buckets.deleted_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_surfaces_backing_store_refusal() {
        let (p, buckets) = provisioner();
        buckets.create_bucket("team-alpha").await.unwrap();
        buckets
            .fail_next_delete("ERROR: S3 error: 409 (BucketNotEmpty)")
            .await;

        let pv = volume(&[
            (ANN_PROVISIONER_ID, "inst-1"),
            (ANN_PV_PATH, "team-alpha"),
        ]);

        let err = p.delete(&pv).await.unwrap_err();
        assert_matches!(
            err,
            Error::BackingStore { ref output, .. } if output.contains("BucketNotEmpty")
        );
        // The bucket survives a refused delete
        assert!(buckets.contains("team-alpha").await);
    }
}
