//! # Core Type Definitions
//!
//! This module contains all core types for the Patchboard graph engine:
//! - Graph identifiers (`NodeId`, `EdgeId`)
//! - The data model (`Socket`, `Node`, `Edge`, `Direction`, `Position`)
//! - Property values (`PropertyValue`)
//! - Error types (`GraphError`, `ConnectError`, `Violation`)
//!
//! ## Consistency Guarantees
//!
//! All cross-references in this model are id-based, never pointer-based:
//! a socket's connected-edge reference is an `EdgeId` that resolves through
//! the owning [`Graph`](crate::Graph). References are cleared by the graph's
//! deletion routines before the referent is released, so a stale id can
//! never be dereferenced into freed state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// =============================================================================
// GRAPH IDENTIFIERS
// =============================================================================

/// Unique identifier for a node within one graph.
///
/// Ids are allocated monotonically by the graph and never reused; the
/// canonical document preserves the allocator state so ids are stable
/// across save/load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Unique identifier for an edge within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

// =============================================================================
// GEOMETRY
// =============================================================================

/// 2D position of a node in scene coordinates.
///
/// The core stores positions verbatim for the UI and the document; it
/// performs no geometry on them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

// =============================================================================
// SOCKET
// =============================================================================

/// Direction of a socket: data flows out of `Output` sockets into `Input`
/// sockets. Directionality is fixed at node creation and is not
/// caller-configurable on connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

/// A single typed connection point owned by exactly one node.
///
/// Invariant: when `edge` is `Some(id)`, the referenced edge's
/// corresponding endpoint (from-socket if `Output`, to-socket if `Input`)
/// is exactly this socket. The graph's mutation routines maintain this
/// bidirectional consistency after every operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Socket {
    /// Whether this socket accepts or produces a connection.
    pub direction: Direction,
    /// Index within the owning node's direction-specific ordered list.
    pub index: usize,
    /// The connected edge, if any. At most one per socket; fan-out is
    /// modeled with SPLIT/MERGE node topology, not multi-edge sockets.
    pub edge: Option<EdgeId>,
}

impl Socket {
    /// Create a new unconnected socket.
    #[must_use]
    pub const fn new(direction: Direction, index: usize) -> Self {
        Self {
            direction,
            index,
            edge: None,
        }
    }

    /// Whether the socket currently holds a connection.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.edge.is_some()
    }
}

// =============================================================================
// PROPERTY VALUES
// =============================================================================

/// Schema-less property value: string, number, or boolean.
///
/// The property map is the opaque state slot that the scripting facade
/// reads and writes; the core attaches no meaning to keys or values.
///
/// Serialization is format-aware: human-readable formats (the JSON
/// document) carry the bare value, compact formats (postcard snapshots)
/// carry a variant tag, since they cannot infer the type from content.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Num(f64),
    Str(String),
}

impl Serialize for PropertyValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            match self {
                Self::Bool(b) => serializer.serialize_bool(*b),
                Self::Num(n) => serializer.serialize_f64(*n),
                Self::Str(s) => serializer.serialize_str(s),
            }
        } else {
            match self {
                Self::Bool(b) => {
                    serializer.serialize_newtype_variant("PropertyValue", 0, "Bool", b)
                }
                Self::Num(n) => serializer.serialize_newtype_variant("PropertyValue", 1, "Num", n),
                Self::Str(s) => serializer.serialize_newtype_variant("PropertyValue", 2, "Str", s),
            }
        }
    }
}

impl<'de> Deserialize<'de> for PropertyValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ValueVisitor;

        impl<'de> serde::de::Visitor<'de> for ValueVisitor {
            type Value = PropertyValue;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a bool, number, or string")
            }

            fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(PropertyValue::Bool(v))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(PropertyValue::Num(v as f64))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(PropertyValue::Num(v as f64))
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(PropertyValue::Num(v))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(PropertyValue::Str(v.to_string()))
            }

            fn visit_string<E: serde::de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(PropertyValue::Str(v))
            }
        }

        struct TaggedVisitor;

        impl<'de> serde::de::Visitor<'de> for TaggedVisitor {
            type Value = PropertyValue;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a tagged property value")
            }

            fn visit_enum<A: serde::de::EnumAccess<'de>>(
                self,
                data: A,
            ) -> Result<Self::Value, A::Error> {
                use serde::de::VariantAccess;
                let (tag, variant): (u32, _) = data.variant()?;
                match tag {
                    0 => variant.newtype_variant().map(PropertyValue::Bool),
                    1 => variant.newtype_variant().map(PropertyValue::Num),
                    2 => variant.newtype_variant().map(PropertyValue::Str),
                    other => Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Unsigned(u64::from(other)),
                        &"variant index 0..=2",
                    )),
                }
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_any(ValueVisitor)
        } else {
            deserializer.deserialize_enum(
                "PropertyValue",
                &["Bool", "Num", "Str"],
                TaggedVisitor,
            )
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        Self::Num(n)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

// =============================================================================
// NODE
// =============================================================================

/// A typed unit owning ordered input and output sockets, a position, an
/// opaque property map, and an optional script-source slot.
///
/// Socket counts are fixed by the node's type template at creation;
/// socket indices are contiguous from 0 within each direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// The node identifier.
    pub id: NodeId,
    /// Type tag resolved through the [`TypeRegistry`](crate::TypeRegistry).
    pub node_type: String,
    /// Position in scene coordinates.
    pub position: Position,
    /// Ordered input sockets (indices 0..n).
    pub inputs: Vec<Socket>,
    /// Ordered output sockets (indices 0..n).
    pub outputs: Vec<Socket>,
    /// Opaque string-keyed property map.
    pub properties: BTreeMap<String, PropertyValue>,
    /// Script source for the scripting collaborator. The core only stores
    /// the string; execution lives outside this crate.
    pub script_source: Option<String>,
}

impl Node {
    /// Create a new node with unconnected sockets per the given counts.
    #[must_use]
    pub fn new(
        id: NodeId,
        node_type: impl Into<String>,
        position: Position,
        inputs: usize,
        outputs: usize,
    ) -> Self {
        Self {
            id,
            node_type: node_type.into(),
            position,
            inputs: (0..inputs).map(|i| Socket::new(Direction::Input, i)).collect(),
            outputs: (0..outputs)
                .map(|i| Socket::new(Direction::Output, i))
                .collect(),
            properties: BTreeMap::new(),
            script_source: None,
        }
    }

    /// Every edge id referenced by this node's sockets, inputs first.
    pub fn incident_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .filter_map(|s| s.edge)
    }
}

// =============================================================================
// EDGE
// =============================================================================

/// A directed connection from one output socket to one input socket.
///
/// Edges are owned by the graph and referenced (not owned) by their two
/// endpoint sockets. Invariant: both endpoints resolve to sockets owned by
/// nodes currently present in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// The edge identifier.
    pub id: EdgeId,
    /// Source node (the "from" endpoint).
    pub from_node: NodeId,
    /// Index into the source node's output socket list.
    pub from_socket: usize,
    /// Destination node (the "to" endpoint).
    pub to_node: NodeId,
    /// Index into the destination node's input socket list.
    pub to_socket: usize,
}

impl Edge {
    /// Whether this edge touches the given node at either endpoint.
    #[must_use]
    pub const fn is_connected_to(&self, node: NodeId) -> bool {
        self.from_node.0 == node.0 || self.to_node.0 == node.0
    }
}

// =============================================================================
// STATS
// =============================================================================

/// Aggregate counts exposed to the UI collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Reason a connection attempt was rejected.
///
/// `can_connect` folds these to a boolean predicate; `connect` surfaces
/// the specific reason so a failed connection is never silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("source node not found: {0:?}")]
    FromNodeMissing(NodeId),

    #[error("destination node not found: {0:?}")]
    ToNodeMissing(NodeId),

    #[error("output socket index {index} out of range on {node:?}")]
    FromSocketMissing { node: NodeId, index: usize },

    #[error("input socket index {index} out of range on {node:?}")]
    ToSocketMissing { node: NodeId, index: usize },

    #[error("self-loop rejected on {0:?}")]
    SelfLoop(NodeId),

    #[error("output socket {index} on {node:?} already connected")]
    OutputOccupied { node: NodeId, index: usize },

    #[error("input socket {index} on {node:?} already connected")]
    InputOccupied { node: NodeId, index: usize },
}

/// Which decode validation pass produced a violation.
///
/// Passes run in order; a higher pass never runs if a lower one fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValidationPass {
    /// Required fields present, types well-formed.
    Schema,
    /// Edge references resolve to decoded nodes and in-range sockets.
    Referential,
    /// No input (or output) socket targeted by more than one edge.
    Uniqueness,
}

/// One decode-time validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub pass: ValidationPass,
    pub detail: String,
}

impl Violation {
    #[must_use]
    pub fn new(pass: ValidationPass, detail: impl Into<String>) -> Self {
        Self {
            pass,
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.pass, self.detail)
    }
}

/// Errors that can occur in the Patchboard engine.
///
/// Invariant checks are preconditions: violating them never corrupts
/// state; the operation simply does not apply and reports failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// Node type is not present in the registry.
    #[error("unknown node type: {0}")]
    UnknownType(String),

    /// A connect attempt that `can_connect` rejects.
    #[error("invalid connection: {0}")]
    InvalidConnection(#[from] ConnectError),

    /// Operation requiring an existing node was given a missing id.
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Import with an id that is already taken.
    #[error("duplicate id: {0}")]
    DuplicateId(u64),

    /// A node record's socket layout disagrees with its type template.
    #[error("node {id} of type {node_type}: socket layout does not match template")]
    TemplateMismatch { id: u64, node_type: String },

    /// `end_batch` without a matching `begin_batch`.
    #[error("end_batch called outside a batch bracket")]
    BatchUnderflow,

    /// Decode-time validation failures; carries the complete violation
    /// list of the first failing pass.
    #[error("document validation failed: {} violation(s)", .0.len())]
    Validation(Vec<Violation>),

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An I/O error from the backing store, opaque to the core.
    #[error("I/O error: {0}")]
    Io(String),
}

impl GraphError {
    /// The violation list if this is a validation failure.
    #[must_use]
    pub fn violations(&self) -> Option<&[Violation]> {
        match self {
            Self::Validation(v) => Some(v),
            _ => None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
