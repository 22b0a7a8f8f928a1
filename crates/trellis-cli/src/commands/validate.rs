//! Validate command - Check a visualization file against the export format.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use trellis_observe::VizDocument;

use crate::OutputFormat;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Path to a broccoli-viz JSON file
    #[arg(required = true)]
    pub file: PathBuf,
}

/// Validation result.
#[derive(Debug, Serialize)]
struct ValidationResult {
    valid: bool,
    path: String,
    nodes: usize,
    warnings: Vec<String>,
    errors: Vec<String>,
}

/// Check a parsed document. Returns `(warnings, errors)`.
fn check(document: &VizDocument) -> (Vec<String>, Vec<String>) {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    if document.nodes.is_empty() {
        warnings.push("File has no nodes".to_string());
    }

    let mut positions: HashMap<u64, usize> = HashMap::new();
    for (index, node) in document.nodes.iter().enumerate() {
        if positions.insert(node.id, index).is_some() {
            errors.push(format!("Duplicate node id {}", node.id));
        }

        match node.name() {
            Some(name) if !name.is_empty() => {}
            _ => errors.push(format!("Node {} has no label name", node.id)),
        }

        for (key, value) in &node.label {
            if is_falsy(value) {
                errors.push(format!("Node {} label has falsy flag '{}'", node.id, key));
            }
        }

        if node.self_time().is_none() {
            warnings.push(format!("Node {} has no time.self stat", node.id));
        }
    }

    let mut claimed: HashSet<u64> = HashSet::new();
    for (index, node) in document.nodes.iter().enumerate() {
        for child in &node.children {
            match positions.get(child) {
                None => errors.push(format!(
                    "Node {} lists child {} which is not in the file",
                    node.id, child
                )),
                Some(&position) if position <= index => errors.push(format!(
                    "Child {} appears before its parent {}",
                    child, node.id
                )),
                Some(_) => {}
            }
            if !claimed.insert(*child) {
                errors.push(format!("Node {} has more than one parent", child));
            }
        }
    }

    if let Some(first) = document.nodes.first() {
        if claimed.contains(&first.id) {
            errors.push(format!("First node {} is not the sub-tree root", first.id));
        }
        let roots = document
            .nodes
            .iter()
            .filter(|node| !claimed.contains(&node.id))
            .count();
        if roots > 1 {
            errors.push(format!("Expected one root node, found {}", roots));
        }
    }

    (warnings, errors)
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Execute the validate command.
pub fn execute(args: ValidateArgs, format: OutputFormat) -> Result<()> {
    let mut result = ValidationResult {
        valid: true,
        path: args.file.display().to_string(),
        nodes: 0,
        warnings: Vec::new(),
        errors: Vec::new(),
    };

    match VizDocument::read(&args.file) {
        Ok(document) => {
            result.nodes = document.nodes.len();
            let (warnings, errors) = check(&document);
            result.warnings = warnings;
            result.errors = errors;
            result.valid = result.errors.is_empty();
            debug!(
                path = %args.file.display(),
                errors = result.errors.len(),
                warnings = result.warnings.len(),
                "Checked visualization file"
            );
        }
        Err(e) => {
            result.valid = false;
            result.errors.push(e.to_string());
        }
    }

    // Output results
    match format {
        OutputFormat::Human => {
            if result.valid {
                println!("File is valid: {}", args.file.display());
                println!("  Nodes: {}", result.nodes);
            } else {
                println!("File is INVALID: {}", args.file.display());
                for error in &result.errors {
                    println!("  Error: {}", error);
                }
            }

            if !result.warnings.is_empty() {
                println!("\nWarnings:");
                for warning in &result.warnings {
                    println!("  - {}", warning);
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::JsonCompact => {
            println!("{}", serde_json::to_string(&result)?);
        }
    }

    if result.valid {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Validation failed"))
    }
}
