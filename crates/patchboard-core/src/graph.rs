//! # Graph Engine
//!
//! The sole mutation authority for the node/socket/edge model.
//!
//! Every public operation is synchronous, single-threaded, and atomic:
//! it either fully succeeds or leaves the graph unchanged. All data
//! structures use `BTreeMap` for deterministic ordering.
//!
//! ## The one deletion routine
//!
//! `delete_edge` is the only place an edge leaves the graph, and it
//! clears both endpoint socket references before removing the edge from
//! the edge table. Node deletion cascades through it. This ordering is
//! what makes a stale socket reference unrepresentable: there is no
//! call site that removes an edge without clearing its sockets.

use crate::observer::{GraphEvent, ObserverHandle, WeakObserver};
use crate::registry::TypeRegistry;
use crate::{
    ConnectError, Edge, EdgeId, GraphError, GraphStats, Node, NodeId, Position, PropertyValue,
};
use std::collections::BTreeMap;
use std::rc::Rc;

// =============================================================================
// GRAPH
// =============================================================================

/// Owns the complete set of nodes and edges and enforces the global
/// invariants: no dangling edges, no duplicate connections, no orphaned
/// sockets.
#[derive(Debug, Default)]
pub struct Graph {
    registry: TypeRegistry,

    /// Node storage: NodeId -> Node. Id order is creation order.
    nodes: BTreeMap<NodeId, Node>,

    /// Edge storage: EdgeId -> Edge. Id order is creation order.
    edges: BTreeMap<EdgeId, Edge>,

    /// Next available ids. Monotonic; never reused within a document.
    next_node_id: u64,
    next_edge_id: u64,

    /// Subscribers, held weakly. Dead handles are pruned on dispatch.
    observers: Vec<WeakObserver>,

    /// Batch bracket depth. While non-zero, events accumulate in
    /// `pending` and flush in order when the outermost bracket closes.
    batch_depth: u32,
    pending: Vec<GraphEvent>,
}

impl Graph {
    /// Create an empty graph with the built-in type registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty graph with a caller-supplied registry.
    #[must_use]
    pub fn with_registry(registry: TypeRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    /// The node type registry.
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Mutable access to the registry, for runtime type registration.
    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    // =========================================================================
    // OBSERVERS & BATCHING
    // =========================================================================

    /// Subscribe an observer to change events. The graph holds only a
    /// weak handle; dropping the `Rc` detaches implicitly.
    pub fn attach(&mut self, observer: &ObserverHandle) {
        self.observers.push(Rc::downgrade(observer));
    }

    /// Unsubscribe an observer.
    pub fn detach(&mut self, observer: &ObserverHandle) {
        self.observers
            .retain(|weak| !weak.upgrade().is_some_and(|rc| Rc::ptr_eq(&rc, observer)));
    }

    /// Open a batch bracket: notification side effects are suppressed
    /// until the matching `end_batch`, then flushed in issue order.
    /// Brackets nest. State changes still apply immediately.
    pub fn begin_batch(&mut self) {
        self.batch_depth = self.batch_depth.saturating_add(1);
    }

    /// Close a batch bracket. Closing the outermost bracket flushes the
    /// accumulated events in order.
    pub fn end_batch(&mut self) -> Result<(), GraphError> {
        if self.batch_depth == 0 {
            return Err(GraphError::BatchUnderflow);
        }
        self.batch_depth -= 1;
        if self.batch_depth == 0 {
            let pending = std::mem::take(&mut self.pending);
            for event in &pending {
                self.dispatch(event);
            }
        }
        Ok(())
    }

    /// Whether a batch bracket is currently open.
    #[must_use]
    pub fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }

    fn emit(&mut self, event: GraphEvent) {
        if self.batch_depth > 0 {
            self.pending.push(event);
        } else {
            self.dispatch(&event);
        }
    }

    fn dispatch(&mut self, event: &GraphEvent) {
        self.observers.retain(|weak| weak.strong_count() > 0);
        // Snapshot the weak handles: an observer may attach or detach
        // others from its callback without invalidating this dispatch.
        let observers = self.observers.clone();
        for weak in &observers {
            if let Some(observer) = weak.upgrade() {
                observer.borrow_mut().on_event(event);
            }
        }
    }

    // =========================================================================
    // NODE OPERATIONS
    // =========================================================================

    /// Create a node of the given type at the given position.
    ///
    /// Socket counts come from the type template and are fixed for the
    /// node's lifetime. Fails with `UnknownType` for unregistered tags.
    pub fn create_node(
        &mut self,
        node_type: &str,
        position: Position,
    ) -> Result<NodeId, GraphError> {
        let id = NodeId(self.next_node_id);
        self.insert_node(id, node_type, position)
    }

    /// Create a node with a caller-supplied id (document load path).
    ///
    /// Runs the exact same validation as `create_node`; additionally
    /// fails with `DuplicateId` if the id is taken. The id allocator is
    /// advanced past the imported id.
    pub fn create_node_with_id(
        &mut self,
        id: NodeId,
        node_type: &str,
        position: Position,
    ) -> Result<NodeId, GraphError> {
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateId(id.0));
        }
        self.insert_node(id, node_type, position)
    }

    fn insert_node(
        &mut self,
        id: NodeId,
        node_type: &str,
        position: Position,
    ) -> Result<NodeId, GraphError> {
        let Some(template) = self.registry.template_for(node_type) else {
            return Err(GraphError::UnknownType(node_type.to_string()));
        };

        let node = Node::new(id, node_type, position, template.inputs, template.outputs);
        self.nodes.insert(id, node);
        self.next_node_id = self.next_node_id.max(id.0.saturating_add(1));

        self.emit(GraphEvent::NodeAdded {
            id,
            node_type: node_type.to_string(),
            position,
            inputs: template.inputs,
            outputs: template.outputs,
        });
        Ok(id)
    }

    /// Delete a node, cascading through every incident edge first.
    ///
    /// Returns `false` if the id does not exist. The silent no-op is
    /// deliberate: UI delete commands race harmlessly against prior
    /// deletes, and an idempotent delete is what they expect.
    pub fn delete_node(&mut self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };

        // Cascade through the edge-delete path so socket clearing runs
        // uniformly for every incident edge.
        let incident: Vec<EdgeId> = node.incident_edges().collect();
        for edge_id in incident {
            self.delete_edge(edge_id);
        }

        self.nodes.remove(&id);
        self.emit(GraphEvent::NodeRemoved { id });
        true
    }

    /// Set a node's absolute position. Returns `false` if not found.
    pub fn move_node(&mut self, id: NodeId, position: Position) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        let from = node.position;
        node.position = position;
        self.emit(GraphEvent::NodeMoved {
            id,
            from,
            to: position,
        });
        true
    }

    /// Set a schema-less property on a node.
    pub fn set_node_property(
        &mut self,
        id: NodeId,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Result<(), GraphError> {
        let key = key.into();
        let value = value.into();
        let Some(node) = self.nodes.get_mut(&id) else {
            return Err(GraphError::NodeNotFound(id));
        };
        node.properties.insert(key.clone(), value.clone());
        self.emit(GraphEvent::PropertySet { id, key, value });
        Ok(())
    }

    /// Read a property from a node's map.
    #[must_use]
    pub fn node_property(&self, id: NodeId, key: &str) -> Option<&PropertyValue> {
        self.nodes.get(&id)?.properties.get(key)
    }

    /// Replace (or clear) a node's script source.
    pub fn set_script_source(
        &mut self,
        id: NodeId,
        source: Option<String>,
    ) -> Result<(), GraphError> {
        let Some(node) = self.nodes.get_mut(&id) else {
            return Err(GraphError::NodeNotFound(id));
        };
        node.script_source = source.clone();
        self.emit(GraphEvent::ScriptSet { id, source });
        Ok(())
    }

    /// A node's script source, if any.
    #[must_use]
    pub fn script_source(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id)?.script_source.as_deref()
    }

    // =========================================================================
    // EDGE OPERATIONS
    // =========================================================================

    /// Pure connection predicate: no side effects, true iff `connect`
    /// with the same arguments would succeed right now.
    #[must_use]
    pub fn can_connect(
        &self,
        from_node: NodeId,
        from_socket: usize,
        to_node: NodeId,
        to_socket: usize,
    ) -> bool {
        self.validate_connection(from_node, from_socket, to_node, to_socket)
            .is_ok()
    }

    /// Connect an output socket to an input socket.
    ///
    /// The predicate is re-validated here, never trusted from an earlier
    /// `can_connect` call, so intervening mutations cannot slip an
    /// invalid edge in.
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_socket: usize,
        to_node: NodeId,
        to_socket: usize,
    ) -> Result<EdgeId, GraphError> {
        let id = EdgeId(self.next_edge_id);
        self.insert_edge(id, from_node, from_socket, to_node, to_socket)
    }

    /// Connect with a caller-supplied edge id (document load path).
    pub fn connect_with_id(
        &mut self,
        id: EdgeId,
        from_node: NodeId,
        from_socket: usize,
        to_node: NodeId,
        to_socket: usize,
    ) -> Result<EdgeId, GraphError> {
        if self.edges.contains_key(&id) {
            return Err(GraphError::DuplicateId(id.0));
        }
        self.insert_edge(id, from_node, from_socket, to_node, to_socket)
    }

    fn insert_edge(
        &mut self,
        id: EdgeId,
        from_node: NodeId,
        from_socket: usize,
        to_node: NodeId,
        to_socket: usize,
    ) -> Result<EdgeId, GraphError> {
        self.validate_connection(from_node, from_socket, to_node, to_socket)?;

        let edge = Edge {
            id,
            from_node,
            from_socket,
            to_node,
            to_socket,
        };
        self.edges.insert(id, edge);
        self.next_edge_id = self.next_edge_id.max(id.0.saturating_add(1));

        // Both endpoints were validated above; the sockets exist.
        if let Some(socket) = self
            .nodes
            .get_mut(&from_node)
            .and_then(|n| n.outputs.get_mut(from_socket))
        {
            socket.edge = Some(id);
        }
        if let Some(socket) = self
            .nodes
            .get_mut(&to_node)
            .and_then(|n| n.inputs.get_mut(to_socket))
        {
            socket.edge = Some(id);
        }

        self.emit(GraphEvent::EdgeAdded {
            id,
            from_node,
            from_socket,
            to_node,
            to_socket,
        });
        Ok(id)
    }

    fn validate_connection(
        &self,
        from_node: NodeId,
        from_socket: usize,
        to_node: NodeId,
        to_socket: usize,
    ) -> Result<(), ConnectError> {
        let from = self
            .nodes
            .get(&from_node)
            .ok_or(ConnectError::FromNodeMissing(from_node))?;
        let to = self
            .nodes
            .get(&to_node)
            .ok_or(ConnectError::ToNodeMissing(to_node))?;

        let out = from
            .outputs
            .get(from_socket)
            .ok_or(ConnectError::FromSocketMissing {
                node: from_node,
                index: from_socket,
            })?;
        let inp = to
            .inputs
            .get(to_socket)
            .ok_or(ConnectError::ToSocketMissing {
                node: to_node,
                index: to_socket,
            })?;

        // Single-node loops are rejected by construction; longer cycles
        // through multiple nodes remain permitted.
        if from_node == to_node {
            return Err(ConnectError::SelfLoop(from_node));
        }
        if out.is_connected() {
            return Err(ConnectError::OutputOccupied {
                node: from_node,
                index: from_socket,
            });
        }
        if inp.is_connected() {
            return Err(ConnectError::InputOccupied {
                node: to_node,
                index: to_socket,
            });
        }
        Ok(())
    }

    /// Delete an edge: clear both endpoint socket references, then
    /// remove the edge. One atomic routine, never split across call
    /// sites. Returns `false` if the id does not exist (idempotent).
    pub fn delete_edge(&mut self, id: EdgeId) -> bool {
        let Some(edge) = self.edges.get(&id).copied() else {
            return false;
        };

        // Clear the back-references BEFORE the edge object is released.
        if let Some(socket) = self
            .nodes
            .get_mut(&edge.from_node)
            .and_then(|n| n.outputs.get_mut(edge.from_socket))
        {
            socket.edge = None;
        }
        if let Some(socket) = self
            .nodes
            .get_mut(&edge.to_node)
            .and_then(|n| n.inputs.get_mut(edge.to_socket))
        {
            socket.edge = None;
        }

        self.edges.remove(&id);
        self.emit(GraphEvent::EdgeRemoved { id });
        true
    }

    // =========================================================================
    // GRAPH-WIDE OPERATIONS
    // =========================================================================

    /// Destroy all nodes and edges. Id allocators are not reset: ids are
    /// never reused within a document's lifetime.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.emit(GraphEvent::Cleared);
    }

    /// Raise the id allocators to at least the given values. Used after
    /// a document load so ids allocated later never collide with ids the
    /// document reserved.
    pub fn raise_id_floor(&mut self, next_node_id: u64, next_edge_id: u64) {
        self.next_node_id = self.next_node_id.max(next_node_id);
        self.next_edge_id = self.next_edge_id.max(next_edge_id);
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Look up an edge.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    /// All nodes in creation (id) order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All edges in creation (id) order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Whether a node exists.
    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Whether an edge exists.
    #[must_use]
    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edges.contains_key(&id)
    }

    /// Edge ids incident on a node, in id order.
    #[must_use]
    pub fn node_edges(&self, id: NodeId) -> Vec<EdgeId> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut edges: Vec<EdgeId> = node.incident_edges().collect();
        edges.sort_unstable();
        edges
    }

    /// Aggregate counts.
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
        }
    }

    /// The next node id that would be assigned.
    #[must_use]
    pub fn next_node_id(&self) -> u64 {
        self.next_node_id
    }

    /// The next edge id that would be assigned.
    #[must_use]
    pub fn next_edge_id(&self) -> u64 {
        self.next_edge_id
    }

    // =========================================================================
    // CONSISTENCY AUDIT
    // =========================================================================

    /// Walk every invariant and return a description of each violation.
    ///
    /// An empty result is the expected outcome after any sequence of
    /// operations; tests and debug assertions lean on this.
    #[must_use]
    pub fn check_consistency(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for edge in self.edges.values() {
            let Some(from) = self.nodes.get(&edge.from_node) else {
                problems.push(format!(
                    "edge {} references missing from-node {}",
                    edge.id.0, edge.from_node.0
                ));
                continue;
            };
            let Some(to) = self.nodes.get(&edge.to_node) else {
                problems.push(format!(
                    "edge {} references missing to-node {}",
                    edge.id.0, edge.to_node.0
                ));
                continue;
            };
            match from.outputs.get(edge.from_socket) {
                Some(socket) if socket.edge == Some(edge.id) => {}
                Some(_) => problems.push(format!(
                    "edge {}: from-socket does not reference it back",
                    edge.id.0
                )),
                None => problems.push(format!(
                    "edge {}: from-socket index {} out of range",
                    edge.id.0, edge.from_socket
                )),
            }
            match to.inputs.get(edge.to_socket) {
                Some(socket) if socket.edge == Some(edge.id) => {}
                Some(_) => problems.push(format!(
                    "edge {}: to-socket does not reference it back",
                    edge.id.0
                )),
                None => problems.push(format!(
                    "edge {}: to-socket index {} out of range",
                    edge.id.0, edge.to_socket
                )),
            }
        }

        for node in self.nodes.values() {
            for socket in node.inputs.iter().chain(node.outputs.iter()) {
                if let Some(edge_id) = socket.edge {
                    if !self.edges.contains_key(&edge_id) {
                        problems.push(format!(
                            "node {} socket {:?}/{} references missing edge {}",
                            node.id.0, socket.direction, socket.index, edge_id.0
                        ));
                    }
                }
            }
            for (i, socket) in node.inputs.iter().enumerate() {
                if socket.index != i {
                    problems.push(format!(
                        "node {} input socket at position {} carries index {}",
                        node.id.0, i, socket.index
                    ));
                }
            }
            for (i, socket) in node.outputs.iter().enumerate() {
                if socket.index != i {
                    problems.push(format!(
                        "node {} output socket at position {} carries index {}",
                        node.id.0, i, socket.index
                    ));
                }
            }
        }

        problems
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::GraphObserver;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn source_and_sink(graph: &mut Graph) -> (NodeId, NodeId) {
        let a = graph
            .create_node("SOURCE", Position::new(0.0, 0.0))
            .expect("create source");
        let b = graph
            .create_node("SINK", Position::new(100.0, 0.0))
            .expect("create sink");
        (a, b)
    }

    #[test]
    fn create_node_allocates_sockets_from_template() {
        let mut graph = Graph::new();
        let id = graph
            .create_node("MERGE", Position::new(1.0, 2.0))
            .expect("create");

        let node = graph.node(id).expect("node exists");
        assert_eq!(node.inputs.len(), 2);
        assert_eq!(node.outputs.len(), 1);
        assert_eq!(node.position, Position::new(1.0, 2.0));
    }

    #[test]
    fn create_node_unknown_type_fails() {
        let mut graph = Graph::new();
        let err = graph
            .create_node("WAVEFOLD", Position::default())
            .expect_err("must fail");
        assert_eq!(err, GraphError::UnknownType("WAVEFOLD".to_string()));
        assert_eq!(graph.stats().node_count, 0);
    }

    #[test]
    fn connect_source_to_sink() {
        let mut graph = Graph::new();
        let (a, b) = source_and_sink(&mut graph);

        assert!(graph.can_connect(a, 0, b, 0));
        let edge = graph.connect(a, 0, b, 0).expect("connect");

        assert_eq!(
            graph.stats(),
            GraphStats {
                node_count: 2,
                edge_count: 1
            }
        );
        let a_out = &graph.node(a).expect("node").outputs[0];
        let b_in = &graph.node(b).expect("node").inputs[0];
        assert_eq!(a_out.edge, Some(edge));
        assert_eq!(b_in.edge, Some(edge));
        assert!(graph.check_consistency().is_empty());
    }

    #[test]
    fn connect_rejects_self_loop() {
        let mut graph = Graph::new();
        let t = graph
            .create_node("TRANSFORM", Position::default())
            .expect("create");

        assert!(!graph.can_connect(t, 0, t, 0));
        let err = graph.connect(t, 0, t, 0).expect_err("must fail");
        assert_eq!(err, GraphError::InvalidConnection(ConnectError::SelfLoop(t)));
        assert_eq!(graph.stats().edge_count, 0);
    }

    #[test]
    fn connect_rejects_occupied_input() {
        let mut graph = Graph::new();
        let (a, b) = source_and_sink(&mut graph);
        let c = graph
            .create_node("SOURCE", Position::default())
            .expect("create");

        graph.connect(a, 0, b, 0).expect("first connect");
        let err = graph.connect(c, 0, b, 0).expect_err("occupied");
        assert_eq!(
            err,
            GraphError::InvalidConnection(ConnectError::InputOccupied { node: b, index: 0 })
        );
    }

    #[test]
    fn connect_rejects_occupied_output() {
        let mut graph = Graph::new();
        let (a, b) = source_and_sink(&mut graph);
        let c = graph
            .create_node("SINK", Position::default())
            .expect("create");

        graph.connect(a, 0, b, 0).expect("first connect");
        let err = graph.connect(a, 0, c, 0).expect_err("occupied");
        assert_eq!(
            err,
            GraphError::InvalidConnection(ConnectError::OutputOccupied { node: a, index: 0 })
        );
    }

    #[test]
    fn connect_rejects_bad_socket_index() {
        let mut graph = Graph::new();
        let (a, b) = source_and_sink(&mut graph);

        assert!(!graph.can_connect(a, 1, b, 0));
        assert!(!graph.can_connect(a, 0, b, 5));
        // SINK has no outputs: using it as the "from" end is a
        // directionality violation by construction.
        assert!(!graph.can_connect(b, 0, a, 0));
    }

    #[test]
    fn delete_edge_clears_both_sockets() {
        let mut graph = Graph::new();
        let (a, b) = source_and_sink(&mut graph);
        let edge = graph.connect(a, 0, b, 0).expect("connect");

        assert!(graph.delete_edge(edge));

        assert!(graph.node(a).expect("node").outputs[0].edge.is_none());
        assert!(graph.node(b).expect("node").inputs[0].edge.is_none());
        assert!(graph.check_consistency().is_empty());
    }

    #[test]
    fn reconnect_after_delete_gets_fresh_id() {
        let mut graph = Graph::new();
        let (a, b) = source_and_sink(&mut graph);

        let first = graph.connect(a, 0, b, 0).expect("connect");
        assert!(graph.delete_edge(first));
        let second = graph.connect(a, 0, b, 0).expect("reconnect");

        assert_ne!(first, second);
    }

    #[test]
    fn delete_node_cascades_incident_edges() {
        let mut graph = Graph::new();
        let src = graph
            .create_node("SOURCE", Position::default())
            .expect("create");
        let split = graph
            .create_node("SPLIT", Position::default())
            .expect("create");
        let sink_a = graph
            .create_node("SINK", Position::default())
            .expect("create");
        let sink_b = graph
            .create_node("SINK", Position::default())
            .expect("create");

        graph.connect(src, 0, split, 0).expect("connect");
        graph.connect(split, 0, sink_a, 0).expect("connect");
        graph.connect(split, 1, sink_b, 0).expect("connect");
        assert_eq!(graph.stats().edge_count, 3);

        assert!(graph.delete_node(split));

        assert_eq!(
            graph.stats(),
            GraphStats {
                node_count: 3,
                edge_count: 0
            }
        );
        assert!(graph.node(src).expect("node").outputs[0].edge.is_none());
        assert!(graph.node(sink_a).expect("node").inputs[0].edge.is_none());
        assert!(graph.node(sink_b).expect("node").inputs[0].edge.is_none());
        assert!(graph.check_consistency().is_empty());
    }

    #[test]
    fn deletes_are_idempotent() {
        let mut graph = Graph::new();
        let (a, b) = source_and_sink(&mut graph);
        let edge = graph.connect(a, 0, b, 0).expect("connect");

        assert!(graph.delete_edge(edge));
        assert!(!graph.delete_edge(edge));

        assert!(graph.delete_node(a));
        assert!(!graph.delete_node(a));
        assert_eq!(graph.stats().node_count, 1);
    }

    #[test]
    fn properties_and_script_slot() {
        let mut graph = Graph::new();
        let (a, _) = source_and_sink(&mut graph);

        graph.set_node_property(a, "gain", 0.5).expect("set");
        graph.set_node_property(a, "label", "osc-1").expect("set");
        graph.set_node_property(a, "muted", false).expect("set");

        assert_eq!(
            graph.node_property(a, "gain"),
            Some(&PropertyValue::Num(0.5))
        );
        assert_eq!(graph.node_property(a, "missing"), None);

        graph
            .set_script_source(a, Some("emit(1)".to_string()))
            .expect("set script");
        assert_eq!(graph.script_source(a), Some("emit(1)"));

        let err = graph
            .set_node_property(NodeId(999), "k", true)
            .expect_err("missing node");
        assert_eq!(err, GraphError::NodeNotFound(NodeId(999)));
    }

    #[test]
    fn node_edges_lists_incident_ids() {
        let mut graph = Graph::new();
        let src = graph
            .create_node("SOURCE", Position::default())
            .expect("create");
        let merge = graph
            .create_node("MERGE", Position::default())
            .expect("create");
        let src2 = graph
            .create_node("SOURCE", Position::default())
            .expect("create");

        let e1 = graph.connect(src, 0, merge, 0).expect("connect");
        let e2 = graph.connect(src2, 0, merge, 1).expect("connect");

        assert_eq!(graph.node_edges(merge), vec![e1, e2]);
        assert_eq!(graph.node_edges(src), vec![e1]);
        assert!(graph.node_edges(NodeId(404)).is_empty());
    }

    #[test]
    fn clear_destroys_everything_but_keeps_id_floor() {
        let mut graph = Graph::new();
        let (a, b) = source_and_sink(&mut graph);
        graph.connect(a, 0, b, 0).expect("connect");

        graph.clear();

        assert_eq!(graph.stats(), GraphStats::default());
        let c = graph
            .create_node("SOURCE", Position::default())
            .expect("create");
        assert!(c.0 >= 2, "ids must not be reused after clear");
    }

    // -------------------------------------------------------------------------
    // Observer & batch behavior
    // -------------------------------------------------------------------------

    struct Recorder {
        events: Vec<GraphEvent>,
    }

    impl GraphObserver for Recorder {
        fn on_event(&mut self, event: &GraphEvent) {
            self.events.push(event.clone());
        }
    }

    fn recorder() -> Rc<RefCell<Recorder>> {
        Rc::new(RefCell::new(Recorder { events: Vec::new() }))
    }

    #[test]
    fn observer_sees_mutations_in_order() {
        let mut graph = Graph::new();
        let rec = recorder();
        let handle: ObserverHandle = rec.clone();
        graph.attach(&handle);

        let (a, b) = source_and_sink(&mut graph);
        let edge = graph.connect(a, 0, b, 0).expect("connect");
        graph.delete_edge(edge);

        let events = &rec.borrow().events;
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], GraphEvent::NodeAdded { id, .. } if id == a));
        assert!(matches!(events[1], GraphEvent::NodeAdded { id, .. } if id == b));
        assert!(matches!(events[2], GraphEvent::EdgeAdded { id, .. } if id == edge));
        assert!(matches!(events[3], GraphEvent::EdgeRemoved { id } if id == edge));
    }

    #[test]
    fn batch_suppresses_then_flushes_events() {
        let mut graph = Graph::new();
        let rec = recorder();
        let handle: ObserverHandle = rec.clone();
        graph.attach(&handle);

        graph.begin_batch();
        let (a, b) = source_and_sink(&mut graph);
        graph.connect(a, 0, b, 0).expect("connect");
        assert!(rec.borrow().events.is_empty(), "suppressed during batch");

        graph.end_batch().expect("end");
        assert_eq!(rec.borrow().events.len(), 3, "flushed in order at end");
    }

    #[test]
    fn nested_batches_flush_at_outermost_close() {
        let mut graph = Graph::new();
        let rec = recorder();
        let handle: ObserverHandle = rec.clone();
        graph.attach(&handle);

        graph.begin_batch();
        graph.begin_batch();
        source_and_sink(&mut graph);
        graph.end_batch().expect("inner");
        assert!(rec.borrow().events.is_empty());
        graph.end_batch().expect("outer");
        assert_eq!(rec.borrow().events.len(), 2);
    }

    #[test]
    fn end_batch_without_begin_errors() {
        let mut graph = Graph::new();
        assert_eq!(graph.end_batch(), Err(GraphError::BatchUnderflow));
    }

    #[test]
    fn detached_and_dropped_observers_stop_receiving() {
        let mut graph = Graph::new();
        let rec = recorder();
        let handle: ObserverHandle = rec.clone();
        graph.attach(&handle);

        graph
            .create_node("SOURCE", Position::default())
            .expect("create");
        assert_eq!(rec.borrow().events.len(), 1);

        graph.detach(&handle);
        graph
            .create_node("SOURCE", Position::default())
            .expect("create");
        assert_eq!(rec.borrow().events.len(), 1);

        let rec2 = recorder();
        let handle2: ObserverHandle = rec2.clone();
        graph.attach(&handle2);
        drop(handle2);
        drop(rec2);
        // Dropped observer is pruned silently, no panic.
        graph
            .create_node("SOURCE", Position::default())
            .expect("create");
    }

    #[test]
    fn import_paths_validate_like_public_ones() {
        let mut graph = Graph::new();
        let id = graph
            .create_node_with_id(NodeId(40), "SOURCE", Position::default())
            .expect("import");
        assert_eq!(id, NodeId(40));
        assert!(graph.next_node_id() > 40);

        let err = graph
            .create_node_with_id(NodeId(40), "SOURCE", Position::default())
            .expect_err("collision");
        assert_eq!(err, GraphError::DuplicateId(40));

        let sink = graph
            .create_node_with_id(NodeId(41), "SINK", Position::default())
            .expect("import");
        let edge = graph
            .connect_with_id(EdgeId(7), id, 0, sink, 0)
            .expect("import edge");
        assert_eq!(edge, EdgeId(7));
        assert!(graph.next_edge_id() > 7);
        assert!(graph.check_consistency().is_empty());
    }
}
