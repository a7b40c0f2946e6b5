//! Bucket Client Adapters
//!
//! Implementations of the [`BucketClient`](crate::domain::ports::BucketClient)
//! port:
//! - `s3cmd`: shells out to the s3cmd command-line client
//! - `memory`: in-memory fake for tests

pub mod memory;
pub mod s3cmd;

pub use memory::*;
pub use s3cmd::*;
