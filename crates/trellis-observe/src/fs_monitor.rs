//! Filesystem monitor.
//!
//! Attributes filesystem calls to the innermost open span as `fs` monitor
//! stats: `<op>.count` and `<op>.time` (nanoseconds) per operation kind.
//! Only one monitor may be installed per process at a time.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, warn};

use trellis_core::{Enablement, Session, StatRecord};

use crate::error::{ReportError, ReportResult};

/// Monitor name the stats are recorded under.
pub const FS_MONITOR: &str = "fs";

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Filesystem operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsOperation {
    /// `fs::metadata`
    Metadata,
    /// `fs::read`
    Read,
    /// `fs::read_to_string`
    ReadToString,
    /// `fs::write`
    Write,
    /// `fs::read_dir`
    ReadDir,
}

impl FsOperation {
    /// Stat prefix for this operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FsOperation::Metadata => "metadata",
            FsOperation::Read => "read",
            FsOperation::ReadToString => "readToString",
            FsOperation::Write => "write",
            FsOperation::ReadDir => "readDir",
        }
    }
}

impl std::fmt::Display for FsOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Installed filesystem monitor. Dropping it uninstalls.
#[derive(Debug)]
pub struct FsMonitor {
    _private: (),
}

impl FsMonitor {
    /// Install the monitor.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::FsMonitorAlreadyInstalled`] while another
    /// install is live.
    pub fn install() -> ReportResult<Self> {
        if INSTALLED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ReportError::FsMonitorAlreadyInstalled);
        }
        debug!("Filesystem monitor installed");
        Ok(Self { _private: () })
    }

    /// Whether a monitor is installed in this process.
    pub fn is_installed() -> bool {
        INSTALLED.load(Ordering::Acquire)
    }

    /// Uninstall the monitor.
    pub fn uninstall(self) {
        drop(self);
    }

    /// Run `f` and attribute its count and duration to the current span.
    ///
    /// The closure's IO result is returned untouched; stats are only
    /// recorded while the session is enabled.
    pub fn track<T>(
        &self,
        session: &mut Session,
        op: FsOperation,
        f: impl FnOnce() -> io::Result<T>,
    ) -> io::Result<T> {
        if !session.is_enabled() {
            return f();
        }

        let start = Instant::now();
        let result = f();
        let elapsed = i64::try_from(start.elapsed().as_nanos()).unwrap_or(i64::MAX);

        if let Err(err) = record(session, op, elapsed) {
            warn!(op = %op, error = %err, "Failed to record filesystem stats");
        }
        result
    }

    /// Tracked [`fs::metadata`].
    pub fn metadata(&self, session: &mut Session, path: impl AsRef<Path>) -> io::Result<fs::Metadata> {
        self.track(session, FsOperation::Metadata, || fs::metadata(path))
    }

    /// Tracked [`fs::read`].
    pub fn read(&self, session: &mut Session, path: impl AsRef<Path>) -> io::Result<Vec<u8>> {
        self.track(session, FsOperation::Read, || fs::read(path))
    }

    /// Tracked [`fs::read_to_string`].
    pub fn read_to_string(&self, session: &mut Session, path: impl AsRef<Path>) -> io::Result<String> {
        self.track(session, FsOperation::ReadToString, || fs::read_to_string(path))
    }

    /// Tracked [`fs::write`].
    pub fn write(
        &self,
        session: &mut Session,
        path: impl AsRef<Path>,
        contents: impl AsRef<[u8]>,
    ) -> io::Result<()> {
        self.track(session, FsOperation::Write, || fs::write(path, contents))
    }

    /// Tracked [`fs::read_dir`], collected into paths.
    pub fn read_dir(&self, session: &mut Session, path: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
        self.track(session, FsOperation::ReadDir, || {
            fs::read_dir(path)?
                .map(|entry| entry.map(|e| e.path()))
                .collect()
        })
    }
}

impl Drop for FsMonitor {
    fn drop(&mut self) {
        INSTALLED.store(false, Ordering::Release);
        debug!("Filesystem monitor uninstalled");
    }
}

fn record(session: &mut Session, op: FsOperation, elapsed: i64) -> trellis_core::SpanResult<()> {
    if !session.has_monitor(FS_MONITOR) {
        session.register_monitor(FS_MONITOR, StatRecord::new)?;
    }
    session.stat_increment(FS_MONITOR, &format!("{}.count", op), 1)?;
    session.stat_increment(FS_MONITOR, &format!("{}.time", op), elapsed)
}

/// Install the monitor when instrumentation is enabled.
pub fn enable_fs_monitor_if_instrumentation_enabled(
    enablement: &Enablement,
) -> ReportResult<Option<FsMonitor>> {
    if !enablement.instrumentation_enabled() {
        return Ok(None);
    }
    FsMonitor::install().map(Some)
}
