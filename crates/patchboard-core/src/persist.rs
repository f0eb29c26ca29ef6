//! # Persistence Controller
//!
//! Owns a graph plus its document mirror and runs the transactional
//! save/load protocol against canonical document files.
//!
//! ## Staged load
//!
//! `load` never applies a document to the live graph until the whole
//! document has been proven applicable:
//!
//! 1. Decode and validate the bytes (schema, referential, uniqueness).
//! 2. Replay the document into a SCRATCH graph through the normal
//!    mutation paths, so template lookups and connection validation run
//!    exactly as they would for interactive edits.
//! 3. Only then clear the live graph and replay into it, inside one
//!    batch bracket, and raise the id allocators to the document's
//!    high-water marks.
//!
//! A document that fails at any stage leaves the live graph untouched.

use crate::codec::{self, DocumentSnapshot};
use crate::observer::ObserverHandle;
use crate::sync::DocumentMirror;
use crate::{Direction, EdgeId, Graph, GraphError, NodeId, Position};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

// =============================================================================
// DOCUMENT STATE
// =============================================================================

/// Lifecycle state of the controlled document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocState {
    /// No unsaved changes.
    Clean,
    /// Unsaved changes exist.
    Dirty,
    /// A load is in progress; mutation events are replay, not edits.
    Loading,
}

// =============================================================================
// PERSISTENCE CONTROLLER
// =============================================================================

/// Binds a graph, its live document mirror, and an optional backing
/// file path into one save/load surface.
pub struct PersistenceController {
    graph: Graph,
    mirror: Rc<RefCell<DocumentMirror>>,
    path: Option<PathBuf>,
    loading: bool,
}

impl Default for PersistenceController {
    fn default() -> Self {
        Self::with_graph(Graph::new())
    }
}

impl PersistenceController {
    /// Controller over a fresh graph with the built-in registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Controller over a caller-prepared graph (custom registry, seeded
    /// content). The mirror is built from the graph's current state.
    #[must_use]
    pub fn with_graph(mut graph: Graph) -> Self {
        let mirror = Rc::new(RefCell::new(DocumentMirror::new()));
        mirror.borrow_mut().rebuild_from(&graph);
        let handle: ObserverHandle = mirror.clone();
        graph.attach(&handle);
        Self {
            graph,
            mirror,
            path: None,
            loading: false,
        }
    }

    /// The controlled graph.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Mutable access to the controlled graph. All edits made here flow
    /// into the mirror and the dirty flag automatically.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// The backing file path, once saved or loaded.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current document lifecycle state.
    #[must_use]
    pub fn state(&self) -> DocState {
        if self.loading {
            DocState::Loading
        } else if self.mirror.borrow().is_dirty() {
            DocState::Dirty
        } else {
            DocState::Clean
        }
    }

    /// Whether unsaved changes exist.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.mirror.borrow().is_dirty()
    }

    /// Toggle incremental mirror maintenance. Re-enabling rebuilds the
    /// mirror from the live graph so it is immediately trustworthy.
    pub fn set_live_sync(&mut self, enabled: bool) {
        let mut mirror = self.mirror.borrow_mut();
        mirror.set_enabled(enabled);
        if enabled {
            mirror.rebuild_from(&self.graph);
        }
    }

    /// Whether incremental mirror maintenance is on.
    #[must_use]
    pub fn live_sync(&self) -> bool {
        self.mirror.borrow().is_enabled()
    }

    /// Discard everything and start a fresh, clean, path-less document.
    pub fn new_document(&mut self) {
        self.graph.clear();
        let mut mirror = self.mirror.borrow_mut();
        mirror.rebuild_from(&self.graph);
        mirror.mark_clean();
        drop(mirror);
        self.path = None;
    }

    // =========================================================================
    // SAVE
    // =========================================================================

    /// Write the canonical document. With no explicit path, saves to the
    /// remembered one; errors if neither exists.
    ///
    /// When the mirror is current, its incrementally maintained bytes
    /// are written directly; otherwise this falls back to a full encode.
    pub fn save(&mut self, path: Option<&Path>) -> Result<PathBuf, GraphError> {
        let target = match path {
            Some(p) => p.to_path_buf(),
            None => self
                .path
                .clone()
                .ok_or_else(|| GraphError::Io("no save path set".to_string()))?,
        };

        let bytes = {
            let mirror = self.mirror.borrow();
            if mirror.is_enabled() && !mirror.is_stale() {
                mirror.to_canonical_bytes()?
            } else {
                codec::encode_graph(&self.graph)?
            }
        };
        std::fs::write(&target, bytes).map_err(|e| GraphError::Io(e.to_string()))?;

        self.mirror.borrow_mut().mark_clean();
        self.path = Some(target.clone());
        Ok(target)
    }

    // =========================================================================
    // LOAD
    // =========================================================================

    /// Replace the live graph with a document from disk. All-or-nothing:
    /// on any error the live graph is exactly as it was before the call.
    pub fn load(&mut self, path: &Path) -> Result<(), GraphError> {
        let bytes = std::fs::read(path).map_err(|e| GraphError::Io(e.to_string()))?;
        let snapshot = codec::decode(&bytes)?;

        // Stage: prove the document applies cleanly against this
        // registry before touching live state.
        let mut scratch = Graph::with_registry(self.graph.registry().clone());
        apply_snapshot(&mut scratch, &snapshot)?;

        // Commit: replay into the live graph inside one batch bracket.
        // The scratch run already proved every step succeeds; the prior
        // snapshot restore below is the backstop if that proof is ever
        // wrong.
        let prior = codec::snapshot_of(&self.graph);
        self.loading = true;
        self.graph.begin_batch();
        self.graph.clear();
        let applied = apply_snapshot(&mut self.graph, &snapshot);
        let ended = self.graph.end_batch();
        self.loading = false;

        if let Err(e) = applied.and(ended) {
            self.graph.clear();
            // The prior snapshot came from this very graph, so it must
            // reapply; a failure here means the engine itself is broken
            // and has to be reported over the original load error.
            if let Err(restore) = apply_snapshot(&mut self.graph, &prior) {
                return Err(GraphError::Serialization(format!(
                    "load failed ({e}) and prior content could not be restored: {restore}"
                )));
            }
            return Err(e);
        }

        let mut mirror = self.mirror.borrow_mut();
        mirror.rebuild_from(&self.graph);
        mirror.mark_clean();
        drop(mirror);
        self.path = Some(path.to_path_buf());
        Ok(())
    }
}

// =============================================================================
// SNAPSHOT REPLAY
// =============================================================================

/// Replay a decoded snapshot into a graph through the normal mutation
/// paths, then raise the id allocators to the document's marks.
///
/// Each node is created from its type template; a record whose socket
/// layout disagrees with the template is a `TemplateMismatch` (the
/// document was written against a different type definition).
pub fn apply_snapshot(graph: &mut Graph, snapshot: &DocumentSnapshot) -> Result<(), GraphError> {
    for record in &snapshot.nodes {
        let id = NodeId(record.id);
        graph.create_node_with_id(id, &record.node_type, Position::new(record.x, record.y))?;

        let created = graph.node(id).ok_or(GraphError::NodeNotFound(id))?;
        if created.inputs.len() != record.socket_count(Direction::Input)
            || created.outputs.len() != record.socket_count(Direction::Output)
        {
            return Err(GraphError::TemplateMismatch {
                id: record.id,
                node_type: record.node_type.clone(),
            });
        }

        for (key, value) in &record.properties {
            graph.set_node_property(id, key.clone(), value.clone())?;
        }
        if record.script.is_some() {
            graph.set_script_source(id, record.script.clone())?;
        }
    }

    for record in &snapshot.edges {
        graph.connect_with_id(
            EdgeId(record.id),
            NodeId(record.from_node),
            record.from_socket,
            NodeId(record.to_node),
            record.to_socket,
        )?;
    }

    graph.raise_id_floor(snapshot.next_node_id, snapshot.next_edge_id);
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SocketTemplate;

    fn controller_with_content() -> PersistenceController {
        let mut controller = PersistenceController::new();
        let graph = controller.graph_mut();
        let a = graph
            .create_node("SOURCE", Position::new(0.0, 0.0))
            .expect("create");
        let b = graph
            .create_node("SINK", Position::new(80.0, 0.0))
            .expect("create");
        graph.connect(a, 0, b, 0).expect("connect");
        graph.set_node_property(a, "rate", 44100.0).expect("set");
        controller
    }

    #[test]
    fn fresh_controller_is_clean() {
        let controller = PersistenceController::new();
        assert_eq!(controller.state(), DocState::Clean);
        assert!(controller.path().is_none());
    }

    #[test]
    fn edits_mark_dirty_and_save_clears() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("patch.json");

        let mut controller = controller_with_content();
        assert_eq!(controller.state(), DocState::Dirty);

        let saved = controller.save(Some(&path)).expect("save");
        assert_eq!(saved, path);
        assert_eq!(controller.state(), DocState::Clean);
        assert_eq!(controller.path(), Some(path.as_path()));

        // A later save can omit the path.
        controller
            .graph_mut()
            .move_node(NodeId(0), Position::new(5.0, 5.0));
        assert!(controller.is_dirty());
        controller.save(None).expect("resave");
        assert!(!controller.is_dirty());
    }

    #[test]
    fn save_without_any_path_errors() {
        let mut controller = controller_with_content();
        let err = controller.save(None).expect_err("no path");
        assert!(matches!(err, GraphError::Io(_)));
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("patch.json");

        let mut controller = controller_with_content();
        controller.save(Some(&path)).expect("save");
        let original = codec::snapshot_of(controller.graph());

        let mut restored = PersistenceController::new();
        restored.load(&path).expect("load");

        assert_eq!(codec::snapshot_of(restored.graph()), original);
        assert_eq!(restored.state(), DocState::Clean);
        assert!(restored.graph().check_consistency().is_empty());

        // Ids allocated after load do not collide with document ids.
        let fresh = restored
            .graph_mut()
            .create_node("TRANSFORM", Position::default())
            .expect("create");
        assert!(fresh.0 >= original.next_node_id);
    }

    #[test]
    fn load_replaces_existing_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("patch.json");

        let mut controller = controller_with_content();
        controller.save(Some(&path)).expect("save");

        let mut other = PersistenceController::new();
        other
            .graph_mut()
            .create_node("MERGE", Position::default())
            .expect("create");
        other.load(&path).expect("load");

        let stats = other.graph().stats();
        assert_eq!(stats.node_count, 2);
        assert_eq!(stats.edge_count, 1);
        assert!(!other.graph().contains_node(NodeId(99)));
    }

    #[test]
    fn failed_load_leaves_live_graph_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            br#"{
                "format": "patchboard-graph",
                "version": 1,
                "nextNodeId": 1,
                "nextEdgeId": 1,
                "nodes": [
                    {"id": 0, "type": "SOURCE", "x": 0.0, "y": 0.0,
                     "sockets": [{"direction": "output", "index": 0}]}
                ],
                "edges": [
                    {"id": 0, "fromNode": 0, "fromSocket": 0, "toNode": 7, "toSocket": 0}
                ]
            }"#,
        )
        .expect("write");

        let mut controller = controller_with_content();
        let before = codec::snapshot_of(controller.graph());

        let err = controller.load(&path).expect_err("must fail");
        assert!(err.violations().is_some());
        assert_eq!(codec::snapshot_of(controller.graph()), before);
    }

    #[test]
    fn load_rejects_unknown_node_type() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("patch.json");

        // Write with a registered type, then load into a controller
        // whose registry never heard of it.
        let mut graph = Graph::new();
        graph
            .registry_mut()
            .register("GRANULAR", SocketTemplate::new(2, 2));
        let mut writer = PersistenceController::with_graph(graph);
        writer
            .graph_mut()
            .create_node("GRANULAR", Position::default())
            .expect("create");
        writer.save(Some(&path)).expect("save");

        let mut reader = PersistenceController::new();
        let before = codec::snapshot_of(reader.graph());
        let err = reader.load(&path).expect_err("unknown type");
        assert_eq!(err, GraphError::UnknownType("GRANULAR".to_string()));
        assert_eq!(codec::snapshot_of(reader.graph()), before);
    }

    #[test]
    fn load_rejects_template_mismatch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("patch.json");

        // Same type tag, different socket layout on the reader side.
        let mut graph = Graph::new();
        graph
            .registry_mut()
            .register("CUSTOM", SocketTemplate::new(1, 1));
        let mut writer = PersistenceController::with_graph(graph);
        writer
            .graph_mut()
            .create_node("CUSTOM", Position::default())
            .expect("create");
        writer.save(Some(&path)).expect("save");

        let mut graph = Graph::new();
        graph
            .registry_mut()
            .register("CUSTOM", SocketTemplate::new(3, 3));
        let mut reader = PersistenceController::with_graph(graph);
        let err = reader.load(&path).expect_err("mismatch");
        assert!(matches!(err, GraphError::TemplateMismatch { .. }));
    }

    #[test]
    fn live_sync_toggle_rebuilds_on_enable() {
        let mut controller = PersistenceController::new();
        controller.set_live_sync(false);

        controller
            .graph_mut()
            .create_node("SOURCE", Position::default())
            .expect("create");

        controller.set_live_sync(true);
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("patch.json");
        controller.save(Some(&path)).expect("save");

        let bytes = std::fs::read(&path).expect("read");
        let snapshot = codec::decode(&bytes).expect("decode");
        assert_eq!(snapshot.nodes.len(), 1);
    }

    #[test]
    fn new_document_resets_everything() {
        let mut controller = controller_with_content();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("patch.json");
        controller.save(Some(&path)).expect("save");

        controller.new_document();
        assert_eq!(controller.graph().stats().node_count, 0);
        assert_eq!(controller.state(), DocState::Clean);
        assert!(controller.path().is_none());
    }
}
