//! Error types for summaries, export and hook dispatch.

use std::path::PathBuf;

use thiserror::Error;

use trellis_core::{Phase, SpanError};

/// Error returned by an addon hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while summarizing, exporting or dispatching a phase report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// A summarizer needed phase arguments that were not supplied.
    #[error("Missing report arguments for phase '{phase}'")]
    MissingReportArgs {
        /// The phase being summarized.
        phase: Phase,
    },

    /// Writing a visualization file failed.
    #[error("Failed to write visualization file {}: {source}", path.display())]
    ExportWrite {
        /// Target path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Reading a visualization file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing a report failed.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// An addon hook returned an error; remaining hooks were not invoked.
    #[error("Addon '{addon}' hook failed: {source}")]
    Hook {
        /// Name of the failing addon.
        addon: String,
        /// The hook's error.
        #[source]
        source: HookError,
    },

    /// The filesystem monitor is already installed in this process.
    #[error("Filesystem monitor is already installed")]
    FsMonitorAlreadyInstalled,

    /// Span tree error.
    #[error("Span error: {0}")]
    Span(#[from] SpanError),
}

/// Result type alias for report operations.
pub type ReportResult<T> = std::result::Result<T, ReportError>;
