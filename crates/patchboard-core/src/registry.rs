//! # Node Type Registry
//!
//! Data-driven node type templates. All node creation goes through a
//! template lookup: the template fixes the socket layout (input and
//! output counts) at creation time, so no per-type subclassing exists
//! anywhere in the engine.
//!
//! Built-in types ship with the engine; additional types can be
//! registered at runtime (scripting hosts, plugins). A registered
//! template may shadow a built-in, but built-ins can never be removed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// SOCKET TEMPLATE
// =============================================================================

/// Socket layout of a node type: how many input and output sockets a
/// node of this type owns. Consulted only at node-creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketTemplate {
    pub inputs: usize,
    pub outputs: usize,
}

impl SocketTemplate {
    /// Create a new template.
    #[must_use]
    pub const fn new(inputs: usize, outputs: usize) -> Self {
        Self { inputs, outputs }
    }
}

// =============================================================================
// TYPE REGISTRY
// =============================================================================

/// Registry mapping type tags to socket templates.
///
/// Uses `BTreeMap` exclusively so `available_types` and iteration order
/// are deterministic.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    builtin: BTreeMap<String, SocketTemplate>,
    registered: BTreeMap<String, SocketTemplate>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let mut builtin = BTreeMap::new();
        builtin.insert("SOURCE".to_string(), SocketTemplate::new(0, 1));
        builtin.insert("SINK".to_string(), SocketTemplate::new(1, 0));
        builtin.insert("TRANSFORM".to_string(), SocketTemplate::new(1, 1));
        builtin.insert("SPLIT".to_string(), SocketTemplate::new(1, 2));
        builtin.insert("MERGE".to_string(), SocketTemplate::new(2, 1));
        Self {
            builtin,
            registered: BTreeMap::new(),
        }
    }
}

impl TypeRegistry {
    /// Registry with only the built-in types.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the template for a type tag.
    ///
    /// Registered templates are consulted first, so runtime registration
    /// may shadow a built-in.
    #[must_use]
    pub fn template_for(&self, node_type: &str) -> Option<SocketTemplate> {
        self.registered
            .get(node_type)
            .or_else(|| self.builtin.get(node_type))
            .copied()
    }

    /// Whether a type tag is known (built-in or registered).
    #[must_use]
    pub fn contains(&self, node_type: &str) -> bool {
        self.registered.contains_key(node_type) || self.builtin.contains_key(node_type)
    }

    /// Register a new node type template at runtime.
    pub fn register(&mut self, node_type: impl Into<String>, template: SocketTemplate) {
        self.registered.insert(node_type.into(), template);
    }

    /// Remove a registered template. Built-in types cannot be removed;
    /// unregistering a shadowing template restores the built-in.
    ///
    /// Returns `true` if a registered template was removed.
    pub fn unregister(&mut self, node_type: &str) -> bool {
        self.registered.remove(node_type).is_some()
    }

    /// Clear all registered templates, preserving built-ins. Useful for
    /// plugin reload scenarios.
    pub fn clear_registered(&mut self) {
        self.registered.clear();
    }

    /// All known type tags, sorted and deduplicated.
    #[must_use]
    pub fn available_types(&self) -> Vec<String> {
        // BTreeMap keys are already sorted; merge the two key sets.
        let mut types: Vec<String> = self.builtin.keys().cloned().collect();
        for key in self.registered.keys() {
            if !self.builtin.contains_key(key) {
                types.push(key.clone());
            }
        }
        types.sort();
        types
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_templates_have_expected_layouts() {
        let registry = TypeRegistry::new();

        assert_eq!(registry.template_for("SOURCE"), Some(SocketTemplate::new(0, 1)));
        assert_eq!(registry.template_for("SINK"), Some(SocketTemplate::new(1, 0)));
        assert_eq!(registry.template_for("TRANSFORM"), Some(SocketTemplate::new(1, 1)));
        assert_eq!(registry.template_for("SPLIT"), Some(SocketTemplate::new(1, 2)));
        assert_eq!(registry.template_for("MERGE"), Some(SocketTemplate::new(2, 1)));
    }

    #[test]
    fn unknown_type_not_found() {
        let registry = TypeRegistry::new();
        assert!(registry.template_for("QUANTIZE").is_none());
        assert!(!registry.contains("QUANTIZE"));
    }

    #[test]
    fn registered_template_shadows_builtin() {
        let mut registry = TypeRegistry::new();
        registry.register("SOURCE", SocketTemplate::new(0, 3));

        assert_eq!(registry.template_for("SOURCE"), Some(SocketTemplate::new(0, 3)));

        // Unregistering restores the built-in, not removes the type.
        assert!(registry.unregister("SOURCE"));
        assert_eq!(registry.template_for("SOURCE"), Some(SocketTemplate::new(0, 1)));
    }

    #[test]
    fn builtins_cannot_be_removed() {
        let mut registry = TypeRegistry::new();
        assert!(!registry.unregister("SINK"));
        assert!(registry.contains("SINK"));
    }

    #[test]
    fn available_types_sorted_and_deduplicated() {
        let mut registry = TypeRegistry::new();
        registry.register("ANALYZER", SocketTemplate::new(1, 0));
        registry.register("SOURCE", SocketTemplate::new(0, 2)); // shadows built-in

        let types = registry.available_types();
        assert_eq!(
            types,
            vec!["ANALYZER", "MERGE", "SINK", "SOURCE", "SPLIT", "TRANSFORM"]
        );
    }

    #[test]
    fn clear_registered_preserves_builtins() {
        let mut registry = TypeRegistry::new();
        registry.register("ANALYZER", SocketTemplate::new(1, 0));
        registry.clear_registered();

        assert!(!registry.contains("ANALYZER"));
        assert!(registry.contains("TRANSFORM"));
    }
}
