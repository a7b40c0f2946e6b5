//! Domain layer - Core port definitions
//!
//! This module defines the traits at the system boundaries: the provisioner
//! contract driven by the reconciliation runtime, and the bucket-client
//! contract the provisioner drives in turn.

pub mod ports;

pub use ports::*;
