//! Inspect command - Summarize a visualization file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::debug;

use trellis_observe::{PhaseSummary, VizDocument, VizNode};

use crate::OutputFormat;

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Path to a broccoli-viz JSON file
    #[arg(required = true)]
    pub file: PathBuf,

    /// Number of nodes to list, by self time
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

/// Inspection result.
#[derive(Debug, Serialize)]
struct InspectionResult {
    path: String,
    summary: PhaseSummary,
    node_count: usize,
    build_steps: usize,
    top_nodes: Vec<NodeDisplay>,
}

#[derive(Debug, Serialize)]
struct NodeDisplay {
    id: u64,
    name: String,
    self_time_ns: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    monitors: Vec<String>,
}

impl From<&VizNode> for NodeDisplay {
    fn from(node: &VizNode) -> Self {
        Self {
            id: node.id,
            name: node.name().unwrap_or("<unnamed>").to_string(),
            self_time_ns: node.self_time().unwrap_or(0),
            monitors: node
                .stats
                .keys()
                .filter(|key| key.as_str() != "time")
                .cloned()
                .collect(),
        }
    }
}

/// The `n` nodes with the highest self time, ties broken by emission order.
fn top_nodes(document: &VizDocument, n: usize) -> Vec<NodeDisplay> {
    let mut nodes: Vec<&VizNode> = document.nodes.iter().collect();
    nodes.sort_by(|a, b| b.self_time().unwrap_or(0).cmp(&a.self_time().unwrap_or(0)));
    nodes.into_iter().take(n).map(NodeDisplay::from).collect()
}

fn count_build_steps(document: &VizDocument) -> usize {
    document
        .nodes
        .iter()
        .filter(|node| {
            let flag = |key: &str| node.label.get(key).and_then(|v| v.as_bool()).unwrap_or(false);
            flag("broccoliNode") && !flag("broccoliCachedNode")
        })
        .count()
}

fn format_nanos(nanos: u64) -> String {
    if nanos >= 1_000_000_000 {
        format!("{:.2}s", nanos as f64 / 1e9)
    } else if nanos >= 1_000_000 {
        format!("{:.2}ms", nanos as f64 / 1e6)
    } else if nanos >= 1_000 {
        format!("{:.2}µs", nanos as f64 / 1e3)
    } else {
        format!("{}ns", nanos)
    }
}

/// Execute the inspect command.
pub fn execute(args: InspectArgs, format: OutputFormat) -> Result<()> {
    let document = VizDocument::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    debug!(path = %args.file.display(), nodes = document.nodes.len(), "Loaded visualization file");

    let result = InspectionResult {
        path: args.file.display().to_string(),
        summary: document.summary.clone(),
        node_count: document.nodes.len(),
        build_steps: count_build_steps(&document),
        top_nodes: top_nodes(&document, args.top),
    };

    // Output results
    match format {
        OutputFormat::Human => {
            println!("File: {}", result.path);
            println!("Total time: {}", format_nanos(result.summary.total_time()));
            println!("Nodes: {}", result.node_count);
            if let Some(build) = result.summary.as_build() {
                println!("Build: {:?} #{}", build.build.kind, build.build.count);
                println!("  Output: {}", build.output);
                println!("  Build steps: {}", build.build_steps);
                if let Some(count) = build.build.changed_file_count {
                    println!("  Changed files: {}", count);
                }
            } else {
                println!("Build steps: {}", result.build_steps);
            }
            println!();

            println!("Top nodes by self time ({}):", result.top_nodes.len());
            for node in &result.top_nodes {
                if node.monitors.is_empty() {
                    println!("  [{}] {} {}", node.id, node.name, format_nanos(node.self_time_ns));
                } else {
                    println!(
                        "  [{}] {} {} ({})",
                        node.id,
                        node.name,
                        format_nanos(node.self_time_ns),
                        node.monitors.join(", ")
                    );
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

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> VizDocument {
        serde_json::from_value(json!({
            "summary": { "totalTime": 60 },
            "nodes": [
                { "id": 1, "label": { "name": "build", "emberCLI": true }, "children": [2, 3], "stats": { "time": { "self": 10 } } },
                { "id": 2, "label": { "name": "babel", "broccoliNode": true }, "children": [], "stats": { "time": { "self": 40 }, "fs": { "read.count": 2 } } },
                { "id": 3, "label": { "name": "funnel", "broccoliNode": true, "broccoliCachedNode": true }, "children": [], "stats": { "time": { "self": 10 } } }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_top_nodes_sorted_by_self_time() {
        let top = top_nodes(&document(), 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "babel");
        assert_eq!(top[0].monitors, vec!["fs".to_string()]);
        // tie keeps emission order
        assert_eq!(top[1].name, "build");
    }

    #[test]
    fn test_count_build_steps_skips_cached() {
        assert_eq!(count_build_steps(&document()), 1);
    }

    #[test]
    fn test_execute_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broccoli-viz.init.json");
        std::fs::write(&path, serde_json::to_vec(&document()).unwrap()).unwrap();

        let args = InspectArgs { file: path, top: 1 };
        assert!(execute(args, OutputFormat::JsonCompact).is_ok());
    }

    #[test]
    fn test_execute_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let args = InspectArgs {
            file: dir.path().join("missing.json"),
            top: 10,
        };
        assert!(execute(args, OutputFormat::Human).is_err());
    }

    #[test]
    fn test_format_nanos() {
        assert_eq!(format_nanos(12), "12ns");
        assert_eq!(format_nanos(1_500_000), "1.50ms");
        assert_eq!(format_nanos(2_000_000_000), "2.00s");
    }
}
