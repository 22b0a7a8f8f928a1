//! Trellis Observability
//!
//! Turns a finished phase's span sub-tree into something other tools can
//! consume:
//!
//! - [`PhaseSummarizer`]: per-phase summaries (`totalTime`, build details)
//! - [`VizDocument`]: the `broccoli-viz.*.json` export
//! - [`HookDispatcher`]: addon hooks receiving each phase report
//! - [`FsMonitor`]: filesystem call counters attributed to the open span
//!
//! # Summaries
//!
//! ```ignore
//! use trellis_observe::{BuildSummarizer, PhaseSummarizer, ReportArgs, SummaryContext};
//!
//! let args = ReportArgs::build(result, ResultAnnotation::initial());
//! let ctx = SummaryContext {
//!     phase: Phase::Build,
//!     build_count: 0,
//!     changed_files_limit: 10,
//!     args: &args,
//! };
//! let summary = BuildSummarizer.summarize(&session.subtree(build)?, &ctx)?;
//! ```
//!
//! # Addon Hooks
//!
//! ```ignore
//! use trellis_observe::{HookDispatcher, LoggingAddon};
//! use std::sync::Arc;
//!
//! let dispatcher = HookDispatcher::new();
//! dispatcher.register(Arc::new(LoggingAddon::new()));
//! dispatcher.dispatch(Phase::Init, &info)?;
//! ```

pub mod error;
pub mod export;
pub mod fs_monitor;
pub mod hooks;
pub mod summary;

// Re-export main types
pub use error::{HookError, ReportError, ReportResult};
pub use export::{VIZ_FILE_PREFIX, VizDocument, VizNode, VizTree, viz_file_name, write_viz_file};
pub use fs_monitor::{
    FS_MONITOR, FsMonitor, FsOperation, enable_fs_monitor_if_instrumentation_enabled,
};
pub use hooks::{
    CollectingAddon, HookDispatcher, HookInvocation, HookKind, InstrumentationAddon,
    InstrumentationInfo, LoggingAddon,
};
pub use summary::{
    BuildInfo, BuildResult, BuildSummarizer, BuildSummary, BuildType, PhaseSummarizer,
    PhaseSummary, ReportArgs, ResultAnnotation, SummaryContext, TimingSummary,
    TotalTimeSummarizer, build_steps, build_summary, total_time,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{ReportError, ReportResult};
    pub use crate::export::VizDocument;
    pub use crate::hooks::{HookDispatcher, InstrumentationAddon, InstrumentationInfo};
    pub use crate::summary::{
        BuildResult, PhaseSummarizer, PhaseSummary, ReportArgs, ResultAnnotation,
    };
}
