//! # Change Notifications
//!
//! Observer pattern for graph mutations. Every successful mutation
//! publishes one [`GraphEvent`]; subscribers (document live-sync, dirty
//! tracking, a UI) apply the equivalent incremental edit on their side
//! without reaching back into the graph.
//!
//! Events carry owned payloads so an observer never needs to borrow the
//! graph while it is being mutated. Observers are held as weak handles:
//! the graph does not own its subscribers and a dropped subscriber is
//! pruned on the next dispatch.

use crate::{EdgeId, NodeId, Position, PropertyValue};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

// =============================================================================
// EVENTS
// =============================================================================

/// A structural or content change applied to a graph.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// A node was created with unconnected sockets per its template.
    NodeAdded {
        id: NodeId,
        node_type: String,
        position: Position,
        inputs: usize,
        outputs: usize,
    },
    /// A node was removed. Its incident edges were removed first, each
    /// with its own `EdgeRemoved` event.
    NodeRemoved { id: NodeId },
    /// A node's position changed.
    NodeMoved {
        id: NodeId,
        from: Position,
        to: Position,
    },
    /// A property was set on a node.
    PropertySet {
        id: NodeId,
        key: String,
        value: PropertyValue,
    },
    /// A node's script source was replaced (or cleared).
    ScriptSet {
        id: NodeId,
        source: Option<String>,
    },
    /// An edge was created between two sockets.
    EdgeAdded {
        id: EdgeId,
        from_node: NodeId,
        from_socket: usize,
        to_node: NodeId,
        to_socket: usize,
    },
    /// An edge was removed; both endpoint sockets were cleared.
    EdgeRemoved { id: EdgeId },
    /// All nodes and edges were destroyed.
    Cleared,
}

// =============================================================================
// OBSERVER TRAIT
// =============================================================================

/// Subscriber to graph change events.
///
/// Single-threaded by design: dispatch happens synchronously on the
/// mutating call, after the graph state change has fully applied.
pub trait GraphObserver {
    fn on_event(&mut self, event: &GraphEvent);
}

/// Shared handle to an observer, as passed to [`Graph::attach`](crate::Graph::attach).
pub type ObserverHandle = Rc<RefCell<dyn GraphObserver>>;

/// Non-owning handle stored inside the graph.
pub type WeakObserver = Weak<RefCell<dyn GraphObserver>>;

// =============================================================================
// TESTS
// =============================================================================
