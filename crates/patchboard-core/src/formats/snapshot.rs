//! # Binary Snapshot Format
//!
//! Compact binary serialization of a document snapshot, for archival
//! copies and fast scratch saves where the canonical JSON document's
//! diff-friendliness is not needed.
//!
//! Format: header (5 bytes) + postcard-serialized snapshot.
//! - 4 bytes: magic ("PTCH")
//! - 1 byte: version
//!
//! Size and header validation happen BEFORE payload deserialization, so
//! corrupt or hostile input is rejected without a large allocation.

use crate::codec::DocumentSnapshot;
use crate::{GraphError, primitives};

/// Minimum valid snapshot size (header only).
const MIN_SNAPSHOT_SIZE: usize = 5;

// =============================================================================
// HEADER
// =============================================================================

/// The snapshot header precedes the payload.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    /// Header at the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::SNAPSHOT_VERSION,
        }
    }

    /// Validate magic and version.
    pub fn validate(&self) -> Result<(), GraphError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(GraphError::Serialization("invalid magic bytes".to_string()));
        }
        if self.version != primitives::SNAPSHOT_VERSION {
            return Err(GraphError::Serialization(format!(
                "unsupported snapshot version: {} (expected {})",
                self.version,
                primitives::SNAPSHOT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GraphError> {
        if bytes.len() < MIN_SNAPSHOT_SIZE {
            return Err(GraphError::Serialization("header too short".to_string()));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a snapshot to bytes (header + payload).
pub fn snapshot_to_bytes(snapshot: &DocumentSnapshot) -> Result<Vec<u8>, GraphError> {
    let header = SnapshotHeader::new();
    let payload =
        postcard::to_stdvec(snapshot).map_err(|e| GraphError::Serialization(e.to_string()))?;

    let mut result = Vec::with_capacity(MIN_SNAPSHOT_SIZE + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a snapshot from bytes.
///
/// Validates minimum size, maximum size, and the header, in that order,
/// before touching the payload.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<DocumentSnapshot, GraphError> {
    if bytes.len() < MIN_SNAPSHOT_SIZE {
        return Err(GraphError::Serialization(
            "data too short: minimum 5 bytes required".to_string(),
        ));
    }
    if bytes.len() > primitives::MAX_SNAPSHOT_PAYLOAD_SIZE {
        return Err(GraphError::Serialization(format!(
            "data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            primitives::MAX_SNAPSHOT_PAYLOAD_SIZE
        )));
    }

    let header = SnapshotHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = &bytes[MIN_SNAPSHOT_SIZE..];
    postcard::from_bytes(payload)
        .map_err(|e| GraphError::Serialization(format!("failed to deserialize snapshot: {e}")))
}

// =============================================================================
// TESTS
// =============================================================================
