//! # Scripting Facade
//!
//! String-and-number surface for an embedded scripting host.
//!
//! The core does not embed a runtime. `ScriptApi` is the binding layer
//! a host wires its functions to: ids travel as plain `u64`, graph data
//! crosses as `serde_json::Value` maps, and every call goes through the
//! same validated `Graph` operations interactive edits use. A script
//! cannot reach a mutation path the engine does not validate.

use crate::{EdgeId, Graph, GraphError, NodeId, Position, PropertyValue};
use serde_json::{Value, json};

/// Property key where a host records the result of its last script run.
pub const LAST_RESULT_KEY: &str = "script.lastResult";

// =============================================================================
// SCRIPT API
// =============================================================================

/// Borrowed facade over a graph for a scripting host.
pub struct ScriptApi<'a> {
    graph: &'a mut Graph,
}

impl<'a> ScriptApi<'a> {
    /// Wrap a graph for the duration of one script invocation.
    #[must_use]
    pub fn new(graph: &'a mut Graph) -> Self {
        Self { graph }
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Create a node; returns its id.
    pub fn create_node(&mut self, node_type: &str, x: f64, y: f64) -> Result<u64, GraphError> {
        self.graph
            .create_node(node_type, Position::new(x, y))
            .map(|id| id.0)
    }

    /// Delete a node (cascading). Returns whether it existed.
    pub fn delete_node(&mut self, id: u64) -> bool {
        self.graph.delete_node(NodeId(id))
    }

    /// Move a node. Returns whether it existed.
    pub fn move_node(&mut self, id: u64, x: f64, y: f64) -> bool {
        self.graph.move_node(NodeId(id), Position::new(x, y))
    }

    /// Connect an output socket to an input socket; returns the edge id.
    pub fn connect(
        &mut self,
        from_node: u64,
        from_socket: usize,
        to_node: u64,
        to_socket: usize,
    ) -> Result<u64, GraphError> {
        self.graph
            .connect(NodeId(from_node), from_socket, NodeId(to_node), to_socket)
            .map(|id| id.0)
    }

    /// Whether a connect call with these arguments would succeed.
    #[must_use]
    pub fn can_connect(
        &self,
        from_node: u64,
        from_socket: usize,
        to_node: u64,
        to_socket: usize,
    ) -> bool {
        self.graph
            .can_connect(NodeId(from_node), from_socket, NodeId(to_node), to_socket)
    }

    /// Delete an edge. Returns whether it existed.
    pub fn delete_edge(&mut self, id: u64) -> bool {
        self.graph.delete_edge(EdgeId(id))
    }

    // =========================================================================
    // PROPERTIES & SCRIPT SOURCE
    // =========================================================================

    /// Set a property from a JSON value. Only bool, number, and string
    /// values are representable.
    pub fn set_property(&mut self, id: u64, key: &str, value: &Value) -> Result<(), GraphError> {
        let value = match value {
            Value::Bool(b) => PropertyValue::Bool(*b),
            Value::Number(n) => PropertyValue::Num(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => PropertyValue::Str(s.clone()),
            other => {
                return Err(GraphError::Serialization(format!(
                    "property value must be bool, number, or string, got {other}"
                )));
            }
        };
        self.graph.set_node_property(NodeId(id), key, value)
    }

    /// Read a property as a JSON value.
    #[must_use]
    pub fn property(&self, id: u64, key: &str) -> Option<Value> {
        self.graph
            .node_property(NodeId(id), key)
            .map(property_to_value)
    }

    /// Replace (or clear) a node's script source.
    pub fn set_script_source(&mut self, id: u64, source: Option<&str>) -> Result<(), GraphError> {
        self.graph
            .set_script_source(NodeId(id), source.map(str::to_string))
    }

    /// A node's script source.
    #[must_use]
    pub fn script_source(&self, id: u64) -> Option<String> {
        self.graph.script_source(NodeId(id)).map(str::to_string)
    }

    /// Record the host's last run result under the reserved key.
    pub fn record_run_result(&mut self, id: u64, result: &str) -> Result<(), GraphError> {
        self.graph
            .set_node_property(NodeId(id), LAST_RESULT_KEY, result)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// A node's data as a JSON object, or `None` if it does not exist.
    #[must_use]
    pub fn node_data(&self, id: u64) -> Option<Value> {
        let node = self.graph.node(NodeId(id))?;
        let properties: Value = node
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), property_to_value(v)))
            .collect::<serde_json::Map<String, Value>>()
            .into();
        Some(json!({
            "id": node.id.0,
            "type": node.node_type,
            "x": node.position.x,
            "y": node.position.y,
            "inputs": node.inputs.len(),
            "outputs": node.outputs.len(),
            "properties": properties,
            "script": node.script_source,
        }))
    }

    /// An edge's data as a JSON object, or `None` if it does not exist.
    #[must_use]
    pub fn edge_data(&self, id: u64) -> Option<Value> {
        let edge = self.graph.edge(EdgeId(id))?;
        Some(json!({
            "id": edge.id.0,
            "fromNode": edge.from_node.0,
            "fromSocket": edge.from_socket,
            "toNode": edge.to_node.0,
            "toSocket": edge.to_socket,
        }))
    }

    /// Aggregate counts as a JSON object.
    #[must_use]
    pub fn stats(&self) -> Value {
        let stats = self.graph.stats();
        json!({
            "nodeCount": stats.node_count,
            "edgeCount": stats.edge_count,
        })
    }

    /// All known node type tags.
    #[must_use]
    pub fn available_types(&self) -> Vec<String> {
        self.graph.registry().available_types()
    }
}

fn property_to_value(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Bool(b) => Value::Bool(*b),
        PropertyValue::Num(n) => json!(n),
        PropertyValue::Str(s) => Value::String(s.clone()),
    }
}

// =============================================================================
// TESTS
// =============================================================================
