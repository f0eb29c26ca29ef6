//! # Alternate Formats
//!
//! Serialization formats beyond the canonical JSON document. File I/O
//! stays in the app layer; everything here is a pure byte transform.

pub mod snapshot;

pub use snapshot::{SnapshotHeader, snapshot_from_bytes, snapshot_to_bytes};
