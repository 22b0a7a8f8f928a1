//! Phase summaries.
//!
//! Every summary is computed by walking the frozen sub-tree of a phase. The
//! `init`, `command` and `shutdown` phases only report total self time; the
//! `build` phase also counts build steps and describes the build result.

use serde::{Deserialize, Serialize};

use trellis_core::{Phase, SubTree};

use crate::error::{ReportError, ReportResult};

/// Summary for phases that only report timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingSummary {
    /// Sum of `time.self` over the sub-tree, in nanoseconds.
    pub total_time: u64,
}

/// Kind of build reported by the build tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    /// First build of the process.
    Initial,
    /// Build triggered by file changes.
    Rebuild,
}

/// The `build` block of a build summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    /// Initial build or rebuild.
    #[serde(rename = "type")]
    pub kind: BuildType,
    /// Zero-based build invocation count.
    pub count: u64,
    /// Output files changed by this build.
    pub output_changed_files: Vec<String>,
    /// File whose change triggered a rebuild.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_file: Option<String>,
    /// Untruncated number of changed input files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_file_count: Option<usize>,
    /// Leading changed input files, truncated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_files: Option<Vec<String>>,
}

/// Summary for the `build` phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
    /// Build description.
    pub build: BuildInfo,
    /// Output directory of the build result.
    pub output: String,
    /// Sum of `time.self` over the sub-tree, in nanoseconds.
    pub total_time: u64,
    /// Build nodes that were not served from cache.
    pub build_steps: u64,
}

/// Summary of any phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhaseSummary {
    /// `build` phase.
    Build(BuildSummary),
    /// `init`, `command` and `shutdown` phases.
    Timing(TimingSummary),
}

impl PhaseSummary {
    /// Total self time of the phase, in nanoseconds.
    pub fn total_time(&self) -> u64 {
        match self {
            PhaseSummary::Build(summary) => summary.total_time,
            PhaseSummary::Timing(summary) => summary.total_time,
        }
    }

    /// The build summary, if this is one.
    pub fn as_build(&self) -> Option<&BuildSummary> {
        match self {
            PhaseSummary::Build(summary) => Some(summary),
            PhaseSummary::Timing(_) => None,
        }
    }
}

/// The result handed back by the build pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildResult {
    /// Output directory.
    pub directory: String,
    /// Output files changed by the build.
    pub output_changes: Vec<String>,
}

impl BuildResult {
    /// Create a build result.
    pub fn new(directory: impl Into<String>, output_changes: Vec<String>) -> Self {
        Self {
            directory: directory.into(),
            output_changes,
        }
    }
}

/// Annotation describing why a build ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultAnnotation {
    /// Initial build or rebuild.
    pub kind: BuildType,
    /// File whose change triggered a rebuild.
    pub primary_file: Option<String>,
    /// Changed input files.
    pub changed_files: Vec<String>,
}

impl ResultAnnotation {
    /// Annotation for an initial build.
    pub fn initial() -> Self {
        Self {
            kind: BuildType::Initial,
            primary_file: None,
            changed_files: Vec::new(),
        }
    }

    /// Annotation for a rebuild.
    pub fn rebuild(primary_file: impl Into<String>, changed_files: Vec<String>) -> Self {
        Self {
            kind: BuildType::Rebuild,
            primary_file: Some(primary_file.into()),
            changed_files,
        }
    }
}

/// Phase-specific arguments passed to `stop_and_report`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReportArgs {
    /// No arguments.
    #[default]
    None,
    /// Arguments of the `build` phase.
    Build {
        /// Build result.
        result: BuildResult,
        /// Result annotation.
        annotation: ResultAnnotation,
    },
}

impl ReportArgs {
    /// Build phase arguments.
    pub fn build(result: BuildResult, annotation: ResultAnnotation) -> Self {
        ReportArgs::Build { result, annotation }
    }
}

/// Inputs available to a summarizer besides the tree itself.
#[derive(Debug, Clone, Copy)]
pub struct SummaryContext<'a> {
    /// Phase being summarized.
    pub phase: Phase,
    /// Build invocation count before this report.
    pub build_count: u64,
    /// Maximum number of changed files listed.
    pub changed_files_limit: usize,
    /// Phase arguments.
    pub args: &'a ReportArgs,
}

/// Computes the summary of one phase.
pub trait PhaseSummarizer: Send + Sync {
    /// Summarize the phase's frozen sub-tree.
    fn summarize(&self, tree: &SubTree<'_>, ctx: &SummaryContext<'_>) -> ReportResult<PhaseSummary>;
}

/// Summarizer reporting only `totalTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TotalTimeSummarizer;

impl PhaseSummarizer for TotalTimeSummarizer {
    fn summarize(&self, tree: &SubTree<'_>, _ctx: &SummaryContext<'_>) -> ReportResult<PhaseSummary> {
        Ok(PhaseSummary::Timing(TimingSummary {
            total_time: total_time(tree),
        }))
    }
}

/// Summarizer for the `build` phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildSummarizer;

impl PhaseSummarizer for BuildSummarizer {
    fn summarize(&self, tree: &SubTree<'_>, ctx: &SummaryContext<'_>) -> ReportResult<PhaseSummary> {
        let ReportArgs::Build { result, annotation } = ctx.args else {
            return Err(ReportError::MissingReportArgs { phase: ctx.phase });
        };
        Ok(PhaseSummary::Build(build_summary(
            tree,
            ctx.build_count,
            result,
            annotation,
            ctx.changed_files_limit,
        )))
    }
}

/// Sum of `time.self` over every node of the sub-tree, in nanoseconds.
pub fn total_time(tree: &SubTree<'_>) -> u64 {
    tree.pre_order()
        .map(|node| node.stats().self_time_nanos())
        .fold(0u64, u64::saturating_add)
}

/// Number of build nodes not served from cache.
pub fn build_steps(tree: &SubTree<'_>) -> u64 {
    tree.pre_order()
        .filter(|node| node.label().is_build_step())
        .count() as u64
}

/// Compute the `build` phase summary.
pub fn build_summary(
    tree: &SubTree<'_>,
    build_count: u64,
    result: &BuildResult,
    annotation: &ResultAnnotation,
    changed_files_limit: usize,
) -> BuildSummary {
    let mut build = BuildInfo {
        kind: annotation.kind,
        count: build_count,
        output_changed_files: result.output_changes.clone(),
        primary_file: None,
        changed_file_count: None,
        changed_files: None,
    };

    if annotation.kind == BuildType::Rebuild {
        build.primary_file = annotation.primary_file.clone();
        build.changed_file_count = Some(annotation.changed_files.len());
        build.changed_files = Some(
            annotation
                .changed_files
                .iter()
                .take(changed_files_limit)
                .cloned()
                .collect(),
        );
    }

    BuildSummary {
        build,
        output: result.directory.clone(),
        total_time: total_time(tree),
        build_steps: build_steps(tree),
    }
}
