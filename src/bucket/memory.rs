//! In-memory Bucket Client
//!
//! A fake implementation of the bucket-client port that records every call,
//! so the provision and delete handlers can be exercised without spawning
//! processes. Deliberately permissive about duplicate creates: deduplication
//! is the backing store's concern, not the provisioner's.

use crate::domain::ports::BucketClient;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryState {
    buckets: BTreeSet<String>,
    created: Vec<String>,
    deleted: Vec<String>,
    fail_create: Option<String>,
    fail_delete: Option<String>,
}

/// Bucket client that tracks buckets in memory
#[derive(Debug, Default)]
pub struct MemoryBucketClient {
    state: Mutex<MemoryState>,
}

impl MemoryBucketClient {
    /// Create an empty in-memory client
    pub fn new() -> Self {
        Self::default()
    }

    /// Every bucket name passed to create, in call order
    pub async fn created_calls(&self) -> Vec<String> {
        self.state.lock().await.created.clone()
    }

    /// Every bucket name passed to delete, in call order
    pub async fn deleted_calls(&self) -> Vec<String> {
        self.state.lock().await.deleted.clone()
    }

    /// Whether the named bucket currently exists
    pub async fn contains(&self, name: &str) -> bool {
        self.state.lock().await.buckets.contains(name)
    }

    /// Make the next create call fail with the given diagnostic output
    pub async fn fail_next_create(&self, output: &str) {
        self.state.lock().await.fail_create = Some(output.to_string());
    }

    /// Make the next delete call fail with the given diagnostic output
    pub async fn fail_next_delete(&self, output: &str) {
        self.state.lock().await.fail_delete = Some(output.to_string());
    }
}

#[async_trait]
impl BucketClient for MemoryBucketClient {
    async fn create_bucket(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.created.push(name.to_string());

        if let Some(output) = state.fail_create.take() {
            return Err(Error::BackingStore {
                operation: "mb".to_string(),
                bucket: name.to_string(),
                output,
            });
        }

        state.buckets.insert(name.to_string());
        Ok(())
    }

    async fn delete_bucket(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.deleted.push(name.to_string());

        if let Some(output) = state.fail_delete.take() {
            return Err(Error::BackingStore {
                operation: "rb".to_string(),
                bucket: name.to_string(),
                output,
            });
        }

        state.buckets.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_create_and_delete_recorded() {
        let client = MemoryBucketClient::new();

        client.create_bucket("a").await.unwrap();
        client.create_bucket("b").await.unwrap();
        client.delete_bucket("a").await.unwrap();

        assert_eq!(client.created_calls().await, vec!["a", "b"]);
        assert_eq!(client.deleted_calls().await, vec!["a"]);
        assert!(!client.contains("a").await);
        assert!(client.contains("b").await);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let client = MemoryBucketClient::new();

        client.fail_next_create("quota exceeded").await;
        let err = client.create_bucket("a").await.unwrap_err();
        assert_matches!(err, Error::BackingStore { ref output, .. } if output == "quota exceeded");

        // The failed call is still recorded, the bucket is not
        assert_eq!(client.created_calls().await, vec!["a"]);
        assert!(!client.contains("a").await);

        // Subsequent calls succeed again
        client.create_bucket("a").await.unwrap();
        assert!(client.contains("a").await);
    }
}
