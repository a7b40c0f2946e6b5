//! MinIO Dynamic Volume Provisioner
//!
//! A Kubernetes external provisioner that creates a MinIO bucket per
//! admitted persistent-volume claim and emits an s3fs-mountable
//! PersistentVolume for it; on release it verifies provenance and removes
//! the bucket.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                    kube runtime Controller                     │
//! │        (watching, work queues, retry/backoff pacing)           │
//! └───────────────┬───────────────────────────────┬───────────────┘
//!                 │ claims                        │ released volumes
//!         ┌───────┴───────┐               ┌───────┴───────┐
//!         │   provision   │               │    delete     │
//!         │   handler     │               │    handler    │
//!         └───────┬───────┘               └───────┬───────┘
//!                 │          BucketClient         │
//!         ┌───────┴───────────────────────────────┴───────┐
//!         │            s3cmd mb / rb  (MinIO)             │
//!         └───────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`volume`]: the provisioning core (admission, provision, delete)
//! - [`bucket`]: bucket-client adapters (s3cmd CLI, in-memory fake)
//! - [`controller`]: wiring between the kube runtime and the core
//! - [`domain`]: port traits at the system boundaries
//! - [`error`]: error types and requeue actions

pub mod bucket;
pub mod controller;
pub mod domain;
pub mod error;
pub mod volume;

// Re-export commonly used types
pub use bucket::{MemoryBucketClient, S3cmdClient, S3cmdConfig};
pub use domain::ports::{
    BucketClient, BucketClientRef, Provisioner, ProvisionerRef, VolumeOptions,
};
pub use error::{Error, ErrorAction, Result};
pub use volume::{MinioProvisioner, ProvisionerConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
