//! Visualization export.
//!
//! The JSON written here is read by external visualization tooling, so the
//! shape is a compatibility contract: nodes are emitted in pre-order, labels
//! drop falsy flags instead of writing `false`, children are listed by id in
//! start order, and stats carry `time.self` plus one object per monitor.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use trellis_core::{Phase, SubTree};

use crate::error::{ReportError, ReportResult};
use crate::hooks::InstrumentationInfo;
use crate::summary::PhaseSummary;

/// Prefix of every viz file name.
pub const VIZ_FILE_PREFIX: &str = "broccoli-viz";

/// One exported node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VizNode {
    /// Node id.
    pub id: u64,
    /// Name plus truthy flags.
    pub label: Map<String, Value>,
    /// Child ids in start order.
    pub children: Vec<u64>,
    /// `time: {self}` plus one entry per touched monitor.
    pub stats: Map<String, Value>,
}

impl VizNode {
    /// Label name, if present.
    pub fn name(&self) -> Option<&str> {
        self.label.get("name").and_then(Value::as_str)
    }

    /// Self time in nanoseconds, if present.
    pub fn self_time(&self) -> Option<u64> {
        self.stats
            .get("time")
            .and_then(|time| time.get("self"))
            .and_then(Value::as_u64)
    }
}

/// Serialized sub-tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VizTree {
    /// Nodes in pre-order.
    pub nodes: Vec<VizNode>,
}

impl VizTree {
    /// Serialize a sub-tree.
    pub fn from_subtree(tree: &SubTree<'_>) -> Self {
        let nodes = tree
            .pre_order()
            .map(|node| VizNode {
                id: node.id().as_u64(),
                label: node.label().to_json(),
                children: node.child_ids().iter().map(|id| id.as_u64()).collect(),
                stats: node.stats().to_json(),
            })
            .collect();
        Self { nodes }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no nodes were exported.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Contents of a `broccoli-viz.*.json` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VizDocument {
    /// Phase summary.
    pub summary: PhaseSummary,
    /// Nodes in pre-order.
    pub nodes: Vec<VizNode>,
}

impl VizDocument {
    /// Build the document for a phase report.
    pub fn from_info(info: &InstrumentationInfo<'_>) -> Self {
        Self {
            summary: info.summary.clone(),
            nodes: VizTree::from_subtree(&info.tree).nodes,
        }
    }

    /// Read a document from disk.
    pub fn read(path: &Path) -> ReportResult<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// File name for a phase: `broccoli-viz.<phase>[.<buildCount>].json`.
pub fn viz_file_name(phase: Phase, build_count: u64) -> String {
    match phase {
        Phase::Build => format!("{}.{}.{}.json", VIZ_FILE_PREFIX, phase, build_count),
        _ => format!("{}.{}.json", VIZ_FILE_PREFIX, phase),
    }
}

/// Write the viz file for a phase report into `dir` and return its path.
///
/// Write failures are returned as-is; nothing is retried.
pub fn write_viz_file(
    dir: &Path,
    phase: Phase,
    build_count: u64,
    info: &InstrumentationInfo<'_>,
) -> ReportResult<PathBuf> {
    let path = dir.join(viz_file_name(phase, build_count));
    let document = VizDocument::from_info(info);
    let bytes = serde_json::to_vec(&document)?;

    std::fs::write(&path, bytes).map_err(|source| ReportError::ExportWrite {
        path: path.clone(),
        source,
    })?;

    info!(
        phase = %phase,
        path = %path.display(),
        nodes = document.nodes.len(),
        "Visualization file written"
    );
    Ok(path)
}
