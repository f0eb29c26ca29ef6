//! # Live Document Mirror
//!
//! Keeps a serialized view of the graph synchronized through change
//! events instead of re-serializing the whole graph on every edit.
//!
//! The mirror subscribes to the graph as an observer and applies each
//! [`GraphEvent`] as an incremental edit to its own record tables. At
//! any point, [`DocumentMirror::to_canonical_bytes`] must produce bytes
//! identical to a full [`codec::encode_graph`] of the live graph; the
//! test suite holds the two paths to that equivalence.
//!
//! The mirror also carries the document dirty flag: any event marks it
//! dirty, and the persistence layer clears it on successful save/load.
//! Incremental application can be disabled for bulk rebuilds; the
//! mirror is then stale until `rebuild_from` runs.

use crate::codec::{self, DocumentSnapshot, EdgeRecord, NodeRecord, SocketRecord};
use crate::observer::{GraphEvent, GraphObserver};
use crate::primitives::{DOCUMENT_FORMAT, DOCUMENT_VERSION};
use crate::{Direction, Graph, GraphError};
use std::collections::BTreeMap;

// =============================================================================
// DOCUMENT MIRROR
// =============================================================================

/// Incrementally maintained serialized form of a graph.
#[derive(Debug)]
pub struct DocumentMirror {
    /// Record tables keyed by id, mirroring the graph's own maps.
    nodes: BTreeMap<u64, NodeRecord>,
    edges: BTreeMap<u64, EdgeRecord>,

    /// Allocator high-water marks. Grow-only, like the graph's.
    next_node_id: u64,
    next_edge_id: u64,

    /// Unsaved changes exist.
    dirty: bool,

    /// Incremental application on/off.
    enabled: bool,

    /// Events were skipped while disabled; tables need a rebuild.
    stale: bool,
}

impl Default for DocumentMirror {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            next_node_id: 0,
            next_edge_id: 0,
            dirty: false,
            enabled: true,
            stale: false,
        }
    }
}

impl DocumentMirror {
    /// An empty, enabled, clean mirror.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether unsaved changes exist.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the document saved.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Whether incremental application is on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Toggle incremental application. Disabling does not invalidate the
    /// tables by itself; missing an event while disabled does.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether events were missed and the tables no longer reflect the
    /// graph. Cleared by `rebuild_from`.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Discard the tables and re-derive them from the graph wholesale.
    pub fn rebuild_from(&mut self, graph: &Graph) {
        let snapshot = codec::snapshot_of(graph);
        self.nodes = snapshot.nodes.into_iter().map(|n| (n.id, n)).collect();
        self.edges = snapshot.edges.into_iter().map(|e| (e.id, e)).collect();
        self.next_node_id = snapshot.next_node_id;
        self.next_edge_id = snapshot.next_edge_id;
        self.stale = false;
    }

    /// The mirror's current state as a document snapshot.
    #[must_use]
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            format: DOCUMENT_FORMAT.to_string(),
            version: DOCUMENT_VERSION,
            next_node_id: self.next_node_id,
            next_edge_id: self.next_edge_id,
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.values().copied().collect(),
        }
    }

    /// Serialize the mirror through the canonical codec path. Identical
    /// bytes to a full encode of the mirrored graph.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, GraphError> {
        codec::encode(&self.snapshot())
    }

    fn apply(&mut self, event: &GraphEvent) {
        match event {
            GraphEvent::NodeAdded {
                id,
                node_type,
                position,
                inputs,
                outputs,
            } => {
                let sockets = (0..*inputs)
                    .map(|i| SocketRecord {
                        direction: Direction::Input,
                        index: i,
                    })
                    .chain((0..*outputs).map(|i| SocketRecord {
                        direction: Direction::Output,
                        index: i,
                    }))
                    .collect();
                self.nodes.insert(
                    id.0,
                    NodeRecord {
                        id: id.0,
                        node_type: node_type.clone(),
                        x: position.x,
                        y: position.y,
                        sockets,
                        properties: BTreeMap::new(),
                        script: None,
                    },
                );
                // The graph allocator only grows at creation, so a max
                // here tracks it exactly.
                self.next_node_id = self.next_node_id.max(id.0.saturating_add(1));
            }
            GraphEvent::NodeRemoved { id } => {
                self.nodes.remove(&id.0);
            }
            GraphEvent::NodeMoved { id, to, .. } => {
                if let Some(record) = self.nodes.get_mut(&id.0) {
                    record.x = to.x;
                    record.y = to.y;
                }
            }
            GraphEvent::PropertySet { id, key, value } => {
                if let Some(record) = self.nodes.get_mut(&id.0) {
                    record.properties.insert(key.clone(), value.clone());
                }
            }
            GraphEvent::ScriptSet { id, source } => {
                if let Some(record) = self.nodes.get_mut(&id.0) {
                    record.script = source.clone();
                }
            }
            GraphEvent::EdgeAdded {
                id,
                from_node,
                from_socket,
                to_node,
                to_socket,
            } => {
                self.edges.insert(
                    id.0,
                    EdgeRecord {
                        id: id.0,
                        from_node: from_node.0,
                        from_socket: *from_socket,
                        to_node: to_node.0,
                        to_socket: *to_socket,
                    },
                );
                self.next_edge_id = self.next_edge_id.max(id.0.saturating_add(1));
            }
            GraphEvent::EdgeRemoved { id } => {
                self.edges.remove(&id.0);
            }
            GraphEvent::Cleared => {
                // Allocator marks survive a clear; ids are never reused.
                self.nodes.clear();
                self.edges.clear();
            }
        }
    }
}

impl GraphObserver for DocumentMirror {
    fn on_event(&mut self, event: &GraphEvent) {
        self.dirty = true;
        if self.enabled {
            self.apply(event);
        } else {
            self.stale = true;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
