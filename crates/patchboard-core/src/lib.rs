//! # patchboard-core
//!
//! The graph consistency and persistence engine for Patchboard - THE LOGIC.
//!
//! This crate is the sole mutation authority for an interactive
//! node-graph document: typed nodes with directional sockets, validated
//! single-connection edges, change notification, a live document
//! mirror, and a transactional save/load pipeline over a canonical
//! JSON document format.
//!
//! ## Architectural Constraints
//!
//! - Every mutation is atomic: it fully applies or leaves the graph
//!   unchanged.
//! - Deletion clears back-references before releasing the referent, so
//!   dangling socket/edge references are unrepresentable.
//! - Deterministic: `BTreeMap` only, canonical byte-stable encoding.
//! - Single-threaded, no async, no network dependencies (pure Rust).

// =============================================================================
// MODULES
// =============================================================================

pub mod codec;
pub mod formats;
pub mod graph;
pub mod observer;
pub mod persist;
pub mod primitives;
pub mod registry;
pub mod script;
pub mod sync;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ConnectError, Direction, Edge, EdgeId, GraphError, GraphStats, Node, NodeId, Position,
    PropertyValue, Socket, ValidationPass, Violation,
};

// =============================================================================
// RE-EXPORTS: Graph Engine
// =============================================================================

pub use graph::Graph;
pub use observer::{GraphEvent, GraphObserver, ObserverHandle, WeakObserver};
pub use registry::{SocketTemplate, TypeRegistry};
pub use script::ScriptApi;

// =============================================================================
// RE-EXPORTS: Persistence
// =============================================================================

pub use codec::{DocumentSnapshot, EdgeRecord, NodeRecord, SocketRecord};
pub use formats::{SnapshotHeader, snapshot_from_bytes, snapshot_to_bytes};
pub use persist::{DocState, PersistenceController, apply_snapshot};
pub use sync::DocumentMirror;
