//! s3cmd Bucket Client
//!
//! Creates and removes buckets by spawning the s3cmd command-line client.
//! Each call blocks for the lifetime of one child process; no timeout is
//! enforced here, the reconciliation runtime owns retry pacing.

use crate::domain::ports::BucketClient;
use crate::error::{Error, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the s3cmd client
#[derive(Debug, Clone)]
pub struct S3cmdConfig {
    /// Path to the s3cmd binary
    pub binary: String,
    /// Skip TLS certificate verification (self-signed MinIO deployments)
    pub no_check_certificate: bool,
}

impl Default for S3cmdConfig {
    fn default() -> Self {
        Self {
            binary: "/usr/bin/s3cmd".to_string(),
            no_check_certificate: true,
        }
    }
}

// =============================================================================
// s3cmd Client
// =============================================================================

/// Bucket client backed by the s3cmd CLI. Endpoint and credentials are read
/// by s3cmd from its own configuration file; this client only names the
/// bucket and the operation.
pub struct S3cmdClient {
    config: S3cmdConfig,
}

impl S3cmdClient {
    /// Create a new s3cmd client
    pub fn new(config: S3cmdConfig) -> Self {
        Self { config }
    }

    /// Build the argument list for one bucket operation
    fn build_args(&self, operation: &str, bucket: &str) -> Vec<String> {
        let mut args = vec![operation.to_string(), format!("s3://{}", bucket)];
        if self.config.no_check_certificate {
            args.push("--no-check-certificate".to_string());
        }
        args
    }

    /// Run one s3cmd invocation, wrapping a non-zero exit (or a spawn
    /// failure) together with the combined process output.
    async fn run(&self, operation: &str, bucket: &str) -> Result<()> {
        let args = self.build_args(operation, bucket);
        debug!("running {} {}", self.config.binary, args.join(" "));

        let output = Command::new(&self.config.binary)
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::BackingStore {
                operation: operation.to_string(),
                bucket: bucket.to_string(),
                output: format!("failed to spawn {}: {}", self.config.binary, e),
            })?;

        if !output.status.success() {
            let combined = combined_output(&output.stdout, &output.stderr);
            return Err(Error::BackingStore {
                operation: operation.to_string(),
                bucket: bucket.to_string(),
                output: format!("{}: {}", output.status, combined),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl BucketClient for S3cmdClient {
    async fn create_bucket(&self, name: &str) -> Result<()> {
        self.run("mb", name).await
    }

    async fn delete_bucket(&self, name: &str) -> Result<()> {
        self.run("rb", name).await
    }
}

/// Merge stdout and stderr into one diagnostic string
fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).trim().to_string();
    let err = String::from_utf8_lossy(stderr);
    let err = err.trim();
    if !err.is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(err);
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_build_args() {
        let client = S3cmdClient::new(S3cmdConfig::default());
        assert_eq!(
            client.build_args("mb", "team-alpha"),
            vec!["mb", "s3://team-alpha", "--no-check-certificate"]
        );
        assert_eq!(
            client.build_args("rb", "pv-1"),
            vec!["rb", "s3://pv-1", "--no-check-certificate"]
        );

        let client = S3cmdClient::new(S3cmdConfig {
            no_check_certificate: false,
            ..S3cmdConfig::default()
        });
        assert_eq!(client.build_args("mb", "b"), vec!["mb", "s3://b"]);
    }

    #[test]
    fn test_combined_output() {
        assert_eq!(combined_output(b"made bucket\n", b""), "made bucket");
        assert_eq!(combined_output(b"", b"access denied\n"), "access denied");
        assert_eq!(
            combined_output(b"partial\n", b"access denied\n"),
            "partial\naccess denied"
        );
    }

    #[tokio::test]
    async fn test_spawn_failure_wraps_backing_store() {
        let client = S3cmdClient::new(S3cmdConfig {
            binary: "/nonexistent/s3cmd".to_string(),
            ..S3cmdConfig::default()
        });

        let err = client.create_bucket("b").await.unwrap_err();
        assert_matches!(err, Error::BackingStore { ref operation, .. } if operation == "mb");
        assert!(err.is_retryable());
    }
}
