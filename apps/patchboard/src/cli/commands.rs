//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//! Each command is a thin file-and-formatting layer over the core
//! codec and persistence controller.

use patchboard_core::{
    DocumentSnapshot, GraphError, PersistenceController, TypeRegistry, codec,
    snapshot_from_bytes, snapshot_to_bytes,
};
use std::path::Path;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum document file size (100 MB).
///
/// Checked before reading so an accidental multi-gigabyte path does not
/// exhaust memory.
const MAX_DOCUMENT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path) -> Result<(), GraphError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| GraphError::Io(format!("cannot read file metadata: {e}")))?;

    if metadata.len() > MAX_DOCUMENT_FILE_SIZE {
        return Err(GraphError::Io(format!(
            "file size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_DOCUMENT_FILE_SIZE
        )));
    }
    Ok(())
}

fn read_document(path: &Path) -> Result<Vec<u8>, GraphError> {
    validate_file_size(path)?;
    std::fs::read(path).map_err(|e| GraphError::Io(format!("cannot read {}: {e}", path.display())))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), GraphError> {
    std::fs::write(path, bytes)
        .map_err(|e| GraphError::Io(format!("cannot write {}: {e}", path.display())))
}

// =============================================================================
// NEW COMMAND
// =============================================================================

/// Write an empty canonical document.
pub fn cmd_new(file: &Path, force: bool) -> Result<(), GraphError> {
    if file.exists() && !force {
        return Err(GraphError::Io(format!(
            "{} already exists (use --force to overwrite)",
            file.display()
        )));
    }

    let bytes = codec::encode(&DocumentSnapshot::empty())?;
    write_file(file, &bytes)?;

    tracing::info!(path = %file.display(), "created empty document");
    println!("Created {}", file.display());
    Ok(())
}

// =============================================================================
// VALIDATE COMMAND
// =============================================================================

/// Decode a document and report every violation of the failing pass.
pub fn cmd_validate(file: &Path, json_mode: bool) -> Result<(), GraphError> {
    let bytes = read_document(file)?;

    match codec::decode(&bytes) {
        Ok(snapshot) => {
            if json_mode {
                let output = serde_json::json!({
                    "file": file.to_string_lossy(),
                    "valid": true,
                    "nodes": snapshot.nodes.len(),
                    "edges": snapshot.edges.len(),
                });
                println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
            } else {
                println!(
                    "{}: valid ({} nodes, {} edges)",
                    file.display(),
                    snapshot.nodes.len(),
                    snapshot.edges.len()
                );
            }
            Ok(())
        }
        Err(err) => {
            if let Some(violations) = err.violations() {
                if json_mode {
                    let output = serde_json::json!({
                        "file": file.to_string_lossy(),
                        "valid": false,
                        "violations": violations
                            .iter()
                            .map(|v| v.to_string())
                            .collect::<Vec<_>>(),
                    });
                    println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
                } else {
                    println!("{}: invalid", file.display());
                    for violation in violations {
                        println!("  {violation}");
                    }
                }
            }
            Err(err)
        }
    }
}

// =============================================================================
// STATS COMMAND
// =============================================================================

/// Load a document through the full engine and print its counts.
pub fn cmd_stats(file: &Path, json_mode: bool) -> Result<(), GraphError> {
    validate_file_size(file)?;

    let mut controller = PersistenceController::new();
    controller.load(file)?;
    let stats = controller.graph().stats();

    if json_mode {
        let output = serde_json::json!({
            "file": file.to_string_lossy(),
            "nodeCount": stats.node_count,
            "edgeCount": stats.edge_count,
        });
        println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
    } else {
        println!("Document: {}", file.display());
        println!("  Nodes: {}", stats.node_count);
        println!("  Edges: {}", stats.edge_count);
    }
    Ok(())
}

// =============================================================================
// NORMALIZE COMMAND
// =============================================================================

/// Decode, replay through the engine, and re-encode canonically.
///
/// This is the repair path for hand-edited documents: key order,
/// whitespace, and optional-field noise all come out canonical, while
/// anything the engine would reject still fails loudly.
pub fn cmd_normalize(file: &Path, output: Option<&Path>) -> Result<(), GraphError> {
    validate_file_size(file)?;

    let mut controller = PersistenceController::new();
    controller.load(file)?;

    let bytes = codec::encode_graph(controller.graph())?;
    let target = output.unwrap_or(file);
    write_file(target, &bytes)?;

    tracing::info!(path = %target.display(), "normalized document");
    println!("Normalized {} -> {}", file.display(), target.display());
    Ok(())
}

// =============================================================================
// TYPES COMMAND
// =============================================================================

/// List the node types a fresh engine registers.
pub fn cmd_types(json_mode: bool) -> Result<(), GraphError> {
    let registry = TypeRegistry::new();
    let types = registry.available_types();

    if json_mode {
        let output: Vec<_> = types
            .iter()
            .filter_map(|tag| {
                registry.template_for(tag).map(|t| {
                    serde_json::json!({
                        "type": tag,
                        "inputs": t.inputs,
                        "outputs": t.outputs,
                    })
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    } else {
        println!("Registered node types:");
        for tag in &types {
            if let Some(template) = registry.template_for(tag) {
                println!(
                    "  {:<12} {} in, {} out",
                    tag, template.inputs, template.outputs
                );
            }
        }
    }
    Ok(())
}

// =============================================================================
// COMPACT COMMAND
// =============================================================================

/// Convert a canonical JSON document to a binary snapshot, or back with
/// `--restore`.
pub fn cmd_compact(file: &Path, output: &Path, restore: bool) -> Result<(), GraphError> {
    let bytes = read_document(file)?;

    let converted = if restore {
        let snapshot = snapshot_from_bytes(&bytes)?;
        codec::encode(&snapshot)?
    } else {
        let snapshot = codec::decode(&bytes)?;
        snapshot_to_bytes(&snapshot)?
    };
    write_file(output, &converted)?;

    tracing::info!(
        from = %file.display(),
        to = %output.display(),
        restore,
        "converted document"
    );
    println!("Wrote {}", output.display());
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
