//! Controller wiring
//!
//! Thin translation layer between the kube runtime and the provisioning
//! core. Watching, work queues, and retry pacing belong to
//! [`kube::runtime::Controller`]; this module only maps claim and volume
//! events onto the provisioner callbacks and turns their results into API
//! calls and requeue actions.

use crate::domain::ports::{ProvisionerRef, VolumeOptions};
use crate::error::{Error, ErrorAction, Result};
use crate::volume::{claim_annotation, volume_annotation, ANN_CREATED_BY, ANN_PV_NAME, CREATED_BY};
use futures::StreamExt;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::{Api, DeleteParams, PostParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher;
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shared state handed to every reconcile invocation
pub struct Context {
    pub client: Client,
    pub provisioner: ProvisionerRef,
}

/// Run the claim and volume controllers until shutdown
pub async fn run(client: Client, provisioner: ProvisionerRef) -> Result<()> {
    let ctx = Arc::new(Context {
        client: client.clone(),
        provisioner,
    });

    let claims: Api<PersistentVolumeClaim> = Api::all(client.clone());
    let volumes: Api<PersistentVolume> = Api::all(client);

    let claim_controller = Controller::new(claims, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile_claim, error_policy, ctx.clone())
        .for_each(|result| async move {
            match result {
                Ok((obj, _)) => debug!("reconciled claim {}", obj.name),
                Err(e) => warn!("claim reconcile error: {}", e),
            }
        });

    let volume_controller = Controller::new(volumes, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile_volume, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _)) => debug!("reconciled volume {}", obj.name),
                Err(e) => warn!("volume reconcile error: {}", e),
            }
        });

    tokio::join!(claim_controller, volume_controller);
    Ok(())
}

// =============================================================================
// Claim Reconciliation
// =============================================================================

async fn reconcile_claim(
    claim: Arc<PersistentVolumeClaim>,
    ctx: Arc<Context>,
) -> Result<Action> {
    if !claim_is_pending(&claim) || !ctx.provisioner.should_provision(&claim) {
        return Ok(Action::await_change());
    }

    let volumes: Api<PersistentVolume> = Api::all(ctx.client.clone());

    // A requeue must not re-provision a claim whose volume already landed
    if let Some(pv_name) = claim_annotation(&claim, ANN_PV_NAME) {
        if volumes.get_opt(pv_name).await?.is_some() {
            debug!("volume {} already provisioned", pv_name);
            return Ok(Action::await_change());
        }
    }

    let options = volume_options(&ctx.client, &claim).await?;
    let pv = ctx.provisioner.provision(&claim, &options).await?;
    let pv_name = pv.metadata.name.as_deref().unwrap_or_default().to_string();

    match volumes.create(&PostParams::default(), &pv).await {
        Ok(_) => info!("created volume {}", pv_name),
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            debug!("volume {} already exists", pv_name);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Action::await_change())
}

/// Assemble the per-provision options: a pre-allocated volume name derived
/// from the claim UID, plus reclaim policy and mount options from the
/// claim's storage class.
async fn volume_options(
    client: &Client,
    claim: &PersistentVolumeClaim,
) -> Result<VolumeOptions> {
    let uid = claim.metadata.uid.as_deref().unwrap_or_default();
    let pv_name = if uid.is_empty() {
        format!("pvc-{}", claim.metadata.name.as_deref().unwrap_or_default())
    } else {
        format!("pvc-{}", uid)
    };

    let class_name = claim
        .spec
        .as_ref()
        .and_then(|s| s.storage_class_name.clone());

    let (reclaim_policy, class_mount_options) = match class_name {
        Some(name) => {
            let classes: Api<StorageClass> = Api::all(client.clone());
            let class = classes.get(&name).await?;
            (class.reclaim_policy, class.mount_options)
        }
        None => (None, None),
    };

    Ok(VolumeOptions {
        pv_name,
        reclaim_policy: reclaim_policy.or_else(|| Some("Delete".to_string())),
        class_mount_options,
    })
}

/// A claim is worth provisioning while it is unbound
fn claim_is_pending(claim: &PersistentVolumeClaim) -> bool {
    let bound = claim
        .spec
        .as_ref()
        .and_then(|s| s.volume_name.as_deref())
        .is_some()
        || claim
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            == Some("Bound");
    !bound
}

// =============================================================================
// Volume Reconciliation
// =============================================================================

async fn reconcile_volume(pv: Arc<PersistentVolume>, ctx: Arc<Context>) -> Result<Action> {
    if !volume_is_reclaimable(&pv) {
        return Ok(Action::await_change());
    }

    let name = pv.metadata.name.as_deref().unwrap_or_default().to_string();

    match ctx.provisioner.delete(&pv).await {
        Ok(()) => {}
        Err(e) if e.is_ignored() => {
            info!("skipping volume {}: {}", name, e);
            return Ok(Action::await_change());
        }
        Err(e) => return Err(e),
    }

    let volumes: Api<PersistentVolume> = Api::all(ctx.client.clone());
    match volumes.delete(&name, &DeleteParams::default()).await {
        Ok(_) => info!("reclaimed volume {}", name),
        Err(kube::Error::Api(ae)) if ae.code == 404 => {}
        Err(e) => return Err(e.into()),
    }

    Ok(Action::await_change())
}

/// A volume is ready for teardown once it was created by this system, has
/// been released by its claim, and asks to be deleted on reclaim
fn volume_is_reclaimable(pv: &PersistentVolume) -> bool {
    volume_annotation(pv, ANN_CREATED_BY) == Some(CREATED_BY)
        && pv.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Released")
        && pv
            .spec
            .as_ref()
            .and_then(|s| s.persistent_volume_reclaim_policy.as_deref())
            == Some("Delete")
}

// =============================================================================
// Error Policy
// =============================================================================

fn error_policy<K>(_obj: Arc<K>, err: &Error, _ctx: Arc<Context>) -> Action {
    requeue_action(err)
}

/// Translate an error's action into a runtime requeue decision
fn requeue_action(err: &Error) -> Action {
    match err.action() {
        ErrorAction::RequeueWithBackoff => Action::requeue(Duration::from_secs(10)),
        ErrorAction::RequeueAfter(duration) => Action::requeue(duration),
        ErrorAction::NoRequeue => Action::await_change(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::testutil::{claim, volume};
    use crate::volume::ANN_PROVISIONER_ID;
    use k8s_openapi::api::core::v1::{
        PersistentVolumeClaimStatus, PersistentVolumeSpec, PersistentVolumeStatus,
    };

    #[test]
    fn test_claim_is_pending() {
        let mut pending = claim(&[]);
        assert!(claim_is_pending(&pending));

        pending.status = Some(PersistentVolumeClaimStatus {
            phase: Some("Bound".to_string()),
            ..Default::default()
        });
        assert!(!claim_is_pending(&pending));

        let mut bound = claim(&[]);
        if let Some(spec) = bound.spec.as_mut() {
            spec.volume_name = Some("pvc-42".to_string());
        }
        assert!(!claim_is_pending(&bound));
    }

    #[test]
    fn test_volume_is_reclaimable() {
        let mut pv = volume(&[
            (ANN_CREATED_BY, CREATED_BY),
            (ANN_PROVISIONER_ID, "inst-1"),
        ]);
        pv.spec = Some(PersistentVolumeSpec {
            persistent_volume_reclaim_policy: Some("Delete".to_string()),
            ..Default::default()
        });
        pv.status = Some(PersistentVolumeStatus {
            phase: Some("Released".to_string()),
            ..Default::default()
        });
        assert!(volume_is_reclaimable(&pv));

        // Still bound
        let mut bound = pv.clone();
        bound.status = Some(PersistentVolumeStatus {
            phase: Some("Bound".to_string()),
            ..Default::default()
        });
        assert!(!volume_is_reclaimable(&bound));

        // Retain policy
        let mut retained = pv.clone();
        retained.spec = Some(PersistentVolumeSpec {
            persistent_volume_reclaim_policy: Some("Retain".to_string()),
            ..Default::default()
        });
        assert!(!volume_is_reclaimable(&retained));

        // Not ours
        let mut foreign = pv.clone();
        foreign.metadata.annotations = None;
        assert!(!volume_is_reclaimable(&foreign));
    }

    #[test]
    fn test_requeue_action_mapping() {
        let store = Error::BackingStore {
            operation: "mb".into(),
            bucket: "b".into(),
            output: "timeout".into(),
        };
        assert_eq!(
            requeue_action(&store),
            Action::requeue(Duration::from_secs(15))
        );

        let fatal = Error::UnsupportedFeature("selector".into());
        assert_eq!(requeue_action(&fatal), Action::await_change());
    }
}
