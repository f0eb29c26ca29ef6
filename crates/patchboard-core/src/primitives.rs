//! # Format Primitives
//!
//! Hardcoded constants shared by the canonical document codec and the
//! binary snapshot envelope. These are compiled into the binary and are
//! immutable at runtime; bumping a version constant is a breaking format
//! change.

/// Format tag written into every canonical document.
///
/// Decoders reject documents whose tag differs; this is what lets a
/// future importer distinguish a Patchboard graph from arbitrary JSON.
pub const DOCUMENT_FORMAT: &str = "patchboard-graph";

/// Current canonical document schema version.
///
/// Increment when making breaking changes to the document schema.
pub const DOCUMENT_VERSION: u32 = 1;

/// Magic bytes for the binary snapshot header.
///
/// File header = magic bytes ("PTCH") + version (u8) before the payload.
pub const MAGIC_BYTES: &[u8; 4] = b"PTCH";

/// Current binary snapshot format version.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Upper bound on a binary snapshot payload, in bytes.
///
/// Payloads beyond this are rejected before deserialization is
/// attempted, so a corrupt length can never drive an allocation.
pub const MAX_SNAPSHOT_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

// =============================================================================
// TESTS
// =============================================================================
