//! # Canonical Document Codec
//!
//! Serializes a graph to the canonical JSON document and decodes one
//! back, validating on the way in.
//!
//! ## Canonical form
//!
//! Encoding the same graph state always yields the same bytes: struct
//! fields serialize in declaration order, node and edge records appear
//! in id order, and property keys are sorted (`BTreeMap`). The output is
//! pretty-printed with a trailing newline so documents diff cleanly
//! under version control.
//!
//! ## Decode validation
//!
//! Decoding runs three ordered passes and reports the COMPLETE violation
//! list of the first pass that fails, never just the first violation:
//!
//! 1. **Schema**: bytes parse as JSON, required fields present with
//!    well-formed types.
//! 2. **Referential**: edge endpoints resolve to decoded nodes and
//!    in-range socket indices; no duplicate ids; no self-loops.
//! 3. **Uniqueness**: no input or output socket targeted by two edges.
//!
//! A document that fails any pass is rejected wholesale; partial
//! application never happens.

use crate::primitives::{DOCUMENT_FORMAT, DOCUMENT_VERSION};
use crate::{Direction, Graph, GraphError, PropertyValue, ValidationPass, Violation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// DOCUMENT RECORDS
// =============================================================================

/// The complete serialized state of one graph document.
///
/// Carries the id allocator high-water marks so ids stay stable and
/// collision-free across save/load cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    pub format: String,
    pub version: u32,
    pub next_node_id: u64,
    pub next_edge_id: u64,
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

impl DocumentSnapshot {
    /// An empty document at the current format version.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            format: DOCUMENT_FORMAT.to_string(),
            version: DOCUMENT_VERSION,
            next_node_id: 0,
            next_edge_id: 0,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }
}

/// One serialized node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: u64,
    #[serde(rename = "type")]
    pub node_type: String,
    pub x: f64,
    pub y: f64,
    pub sockets: Vec<SocketRecord>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

/// One serialized socket. Connectivity is not stored here; edges carry
/// it, so a socket's connection state is derived on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketRecord {
    pub direction: Direction,
    pub index: usize,
}

/// One serialized edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    pub id: u64,
    pub from_node: u64,
    pub from_socket: usize,
    pub to_node: u64,
    pub to_socket: usize,
}

impl NodeRecord {
    /// Socket count in the given direction.
    #[must_use]
    pub fn socket_count(&self, direction: Direction) -> usize {
        self.sockets
            .iter()
            .filter(|s| s.direction == direction)
            .count()
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Capture the full serializable state of a graph.
#[must_use]
pub fn snapshot_of(graph: &Graph) -> DocumentSnapshot {
    let nodes = graph
        .nodes()
        .map(|node| NodeRecord {
            id: node.id.0,
            node_type: node.node_type.clone(),
            x: node.position.x,
            y: node.position.y,
            sockets: node
                .inputs
                .iter()
                .chain(node.outputs.iter())
                .map(|s| SocketRecord {
                    direction: s.direction,
                    index: s.index,
                })
                .collect(),
            properties: node.properties.clone(),
            script: node.script_source.clone(),
        })
        .collect();

    let edges = graph
        .edges()
        .map(|edge| EdgeRecord {
            id: edge.id.0,
            from_node: edge.from_node.0,
            from_socket: edge.from_socket,
            to_node: edge.to_node.0,
            to_socket: edge.to_socket,
        })
        .collect();

    DocumentSnapshot {
        format: DOCUMENT_FORMAT.to_string(),
        version: DOCUMENT_VERSION,
        next_node_id: graph.next_node_id(),
        next_edge_id: graph.next_edge_id(),
        nodes,
        edges,
    }
}

/// Serialize a snapshot to canonical document bytes.
pub fn encode(snapshot: &DocumentSnapshot) -> Result<Vec<u8>, GraphError> {
    let mut bytes = serde_json::to_vec_pretty(snapshot)
        .map_err(|e| GraphError::Serialization(e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Serialize a graph directly to canonical document bytes.
pub fn encode_graph(graph: &Graph) -> Result<Vec<u8>, GraphError> {
    encode(&snapshot_of(graph))
}

// =============================================================================
// DECODING
// =============================================================================

/// Parse and validate canonical document bytes.
///
/// Returns the decoded snapshot, or `GraphError::Validation` with the
/// complete violation list of the first failing pass.
pub fn decode(bytes: &[u8]) -> Result<DocumentSnapshot, GraphError> {
    // Well-formedness is part of the schema pass: a document that does
    // not parse reports a violation like any other schema failure.
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(e) => {
            return Err(GraphError::Validation(vec![Violation::new(
                ValidationPass::Schema,
                format!("malformed JSON: {e}"),
            )]));
        }
    };

    let violations = schema_pass(&value);
    if !violations.is_empty() {
        return Err(GraphError::Validation(violations));
    }

    // The schema pass guarantees this conversion succeeds.
    let snapshot: DocumentSnapshot =
        serde_json::from_value(value).map_err(|e| GraphError::Serialization(e.to_string()))?;

    let violations = referential_pass(&snapshot);
    if !violations.is_empty() {
        return Err(GraphError::Validation(violations));
    }

    let violations = uniqueness_pass(&snapshot);
    if !violations.is_empty() {
        return Err(GraphError::Validation(violations));
    }

    Ok(snapshot)
}

// -----------------------------------------------------------------------------
// Pass 1: schema
// -----------------------------------------------------------------------------

fn schema_pass(value: &Value) -> Vec<Violation> {
    let mut violations = Vec::new();
    let fail = |detail: String| Violation::new(ValidationPass::Schema, detail);

    let Some(root) = value.as_object() else {
        return vec![fail("document root is not an object".to_string())];
    };

    match root.get("format").and_then(Value::as_str) {
        Some(DOCUMENT_FORMAT) => {}
        Some(other) => violations.push(fail(format!("unrecognized format tag: {other:?}"))),
        None => violations.push(fail("missing or non-string field: format".to_string())),
    }
    match root.get("version").and_then(Value::as_u64) {
        Some(v) if v == u64::from(DOCUMENT_VERSION) => {}
        Some(v) => violations.push(fail(format!("unsupported document version: {v}"))),
        None => violations.push(fail("missing or non-integer field: version".to_string())),
    }
    for field in ["nextNodeId", "nextEdgeId"] {
        if root.get(field).and_then(Value::as_u64).is_none() {
            violations.push(fail(format!("missing or non-integer field: {field}")));
        }
    }

    match root.get("nodes").and_then(Value::as_array) {
        Some(nodes) => {
            for (i, node) in nodes.iter().enumerate() {
                check_node_record(i, node, &mut violations);
            }
        }
        None => violations.push(fail("missing or non-array field: nodes".to_string())),
    }
    match root.get("edges").and_then(Value::as_array) {
        Some(edges) => {
            for (i, edge) in edges.iter().enumerate() {
                check_edge_record(i, edge, &mut violations);
            }
        }
        None => violations.push(fail("missing or non-array field: edges".to_string())),
    }

    violations
}

fn check_node_record(i: usize, value: &Value, violations: &mut Vec<Violation>) {
    let fail = |detail: String| Violation::new(ValidationPass::Schema, detail);

    let Some(node) = value.as_object() else {
        violations.push(fail(format!("nodes[{i}] is not an object")));
        return;
    };

    if node.get("id").and_then(Value::as_u64).is_none() {
        violations.push(fail(format!("nodes[{i}]: missing or non-integer field: id")));
    }
    if node.get("type").and_then(Value::as_str).is_none() {
        violations.push(fail(format!("nodes[{i}]: missing or non-string field: type")));
    }
    for field in ["x", "y"] {
        if node.get(field).and_then(Value::as_f64).is_none() {
            violations.push(fail(format!(
                "nodes[{i}]: missing or non-numeric field: {field}"
            )));
        }
    }

    match node.get("sockets").and_then(Value::as_array) {
        Some(sockets) => {
            for (j, socket) in sockets.iter().enumerate() {
                let Some(socket) = socket.as_object() else {
                    violations.push(fail(format!("nodes[{i}].sockets[{j}] is not an object")));
                    continue;
                };
                match socket.get("direction").and_then(Value::as_str) {
                    Some("input" | "output") => {}
                    _ => violations.push(fail(format!(
                        "nodes[{i}].sockets[{j}]: direction must be \"input\" or \"output\""
                    ))),
                }
                if socket.get("index").and_then(Value::as_u64).is_none() {
                    violations.push(fail(format!(
                        "nodes[{i}].sockets[{j}]: missing or non-integer field: index"
                    )));
                }
            }
        }
        None => violations.push(fail(format!(
            "nodes[{i}]: missing or non-array field: sockets"
        ))),
    }

    if let Some(props) = node.get("properties") {
        match props.as_object() {
            Some(map) => {
                for (key, val) in map {
                    if !matches!(val, Value::Bool(_) | Value::Number(_) | Value::String(_)) {
                        violations.push(fail(format!(
                            "nodes[{i}].properties[{key:?}]: value must be bool, number, or string"
                        )));
                    }
                }
            }
            None => violations.push(fail(format!("nodes[{i}]: properties is not an object"))),
        }
    }
    if let Some(script) = node.get("script") {
        if !script.is_string() && !script.is_null() {
            violations.push(fail(format!("nodes[{i}]: script must be a string")));
        }
    }
}

fn check_edge_record(i: usize, value: &Value, violations: &mut Vec<Violation>) {
    let fail = |detail: String| Violation::new(ValidationPass::Schema, detail);

    let Some(edge) = value.as_object() else {
        violations.push(fail(format!("edges[{i}] is not an object")));
        return;
    };
    for field in ["id", "fromNode", "fromSocket", "toNode", "toSocket"] {
        if edge.get(field).and_then(Value::as_u64).is_none() {
            violations.push(fail(format!(
                "edges[{i}]: missing or non-integer field: {field}"
            )));
        }
    }
}

// -----------------------------------------------------------------------------
// Pass 2: referential
// -----------------------------------------------------------------------------

fn referential_pass(snapshot: &DocumentSnapshot) -> Vec<Violation> {
    let mut violations = Vec::new();
    let fail = |detail: String| Violation::new(ValidationPass::Referential, detail);

    let mut node_ids = BTreeSet::new();
    for node in &snapshot.nodes {
        if !node_ids.insert(node.id) {
            violations.push(fail(format!("duplicate node id: {}", node.id)));
        }
    }
    let nodes: BTreeMap<u64, &NodeRecord> = snapshot.nodes.iter().map(|n| (n.id, n)).collect();

    let mut edge_ids = BTreeSet::new();
    for edge in &snapshot.edges {
        if !edge_ids.insert(edge.id) {
            violations.push(fail(format!("duplicate edge id: {}", edge.id)));
        }
        if edge.from_node == edge.to_node {
            violations.push(fail(format!(
                "edge {}: self-loop on node {}",
                edge.id, edge.from_node
            )));
        }
        match nodes.get(&edge.from_node) {
            Some(node) => {
                if edge.from_socket >= node.socket_count(Direction::Output) {
                    violations.push(fail(format!(
                        "edge {}: output socket index {} out of range on node {}",
                        edge.id, edge.from_socket, edge.from_node
                    )));
                }
            }
            None => violations.push(fail(format!(
                "edge {}: unknown from-node {}",
                edge.id, edge.from_node
            ))),
        }
        match nodes.get(&edge.to_node) {
            Some(node) => {
                if edge.to_socket >= node.socket_count(Direction::Input) {
                    violations.push(fail(format!(
                        "edge {}: input socket index {} out of range on node {}",
                        edge.id, edge.to_socket, edge.to_node
                    )));
                }
            }
            None => violations.push(fail(format!(
                "edge {}: unknown to-node {}",
                edge.id, edge.to_node
            ))),
        }
    }

    violations
}

// -----------------------------------------------------------------------------
// Pass 3: uniqueness
// -----------------------------------------------------------------------------

fn uniqueness_pass(snapshot: &DocumentSnapshot) -> Vec<Violation> {
    let mut violations = Vec::new();
    let fail = |detail: String| Violation::new(ValidationPass::Uniqueness, detail);

    let mut outputs_taken = BTreeSet::new();
    let mut inputs_taken = BTreeSet::new();
    for edge in &snapshot.edges {
        if !outputs_taken.insert((edge.from_node, edge.from_socket)) {
            violations.push(fail(format!(
                "output socket {} on node {} targeted by more than one edge",
                edge.from_socket, edge.from_node
            )));
        }
        if !inputs_taken.insert((edge.to_node, edge.to_socket)) {
            violations.push(fail(format!(
                "input socket {} on node {} targeted by more than one edge",
                edge.to_socket, edge.to_node
            )));
        }
    }

    violations
}

// =============================================================================
// TESTS
// =============================================================================
