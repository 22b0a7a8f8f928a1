//! # Trellis - Build Instrumentation
//!
//! Trellis records a hierarchical timeline of a build tool's work and turns
//! each lifecycle phase into a report: a summary, the phase's span sub-tree,
//! addon hook calls and, optionally, a `broccoli-viz.*.json` file.
//!
//! ## Features
//!
//! - **Span tree**: nested, labeled timing spans with per-node counters
//! - **Phases**: `init`, `build`, `command` and `shutdown` controllers
//! - **Export**: visualization JSON written per phase
//! - **Hooks**: addons receive every phase report
//!
//! ## Quick Start
//!
//! ```ignore
//! use trellis::prelude::*;
//!
//! let mut instrumentation = Instrumentation::builder()
//!     .with_addon(Arc::new(LoggingAddon::new()))
//!     .build()?;
//!
//! instrumentation.start("build")?;
//! let step = instrumentation
//!     .session_mut()
//!     .start(SpanLabel::build_node("babel"))?;
//! step.stop(instrumentation.session_mut())?;
//!
//! let args = ReportArgs::build(
//!     BuildResult::new("dist", vec!["app.js".into()]),
//!     ResultAnnotation::initial(),
//! );
//! instrumentation.stop_and_report("build", args)?;
//! ```
//!
//! ## Enablement
//!
//! Nothing is recorded unless `EMBER_CLI_INSTRUMENTATION=1` or
//! `BROCCOLI_VIZ=1` is set (or an explicit [`Enablement`] says otherwise).
//! While disabled every start and report is a no-op.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Your Build Tool                      │
//! ├─────────────────────────────────────────────────────────┤
//! │                  trellis (phase controller)             │
//! │  ┌──────────────────────────┬────────────────────────┐  │
//! │  │ trellis-core             │ trellis-observe        │  │
//! │  │ (session, span tree,     │ (summaries, viz        │  │
//! │  │  monitors, enablement)   │  export, addon hooks)  │  │
//! │  └──────────────────────────┴────────────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use trellis_core::{
    Cookie, Enablement, InstrumentationConfig, NodeId, Phase, Session, SpanError,
};
use trellis_observe::{
    BuildSummarizer, HookDispatcher, InstrumentationAddon, InstrumentationInfo, PhaseSummarizer,
    PhaseSummary, ReportArgs, ReportError, SummaryContext, TotalTimeSummarizer, write_viz_file,
};

// Re-export from sub-crates
pub use trellis_core;
pub use trellis_observe;

/// Logged when no init span was handed over by the launcher.
pub const MISSING_INIT_ADVISORY: &str = "No init instrumentation passed to CLI.  Please update your global ember or \
     invoke ember via the local executable within node_modules.  Init \
     instrumentation will still be recorded, but some bootstraping will be \
     omitted.";

/// Errors from the phase controller.
#[derive(Debug, thiserror::Error)]
pub enum InstrumentationError {
    /// The phase name is not one of `init`, `build`, `command`, `shutdown`.
    #[error("No such instrumentation \"{0}\"")]
    UnknownPhase(String),

    /// `stop_and_report` was called for a phase that holds no cookie.
    #[error("Cannot stop instrumentation \"{0}\".  It has not started.")]
    NotStarted(Phase),

    /// No summarizer is registered for the phase.
    #[error("No summary found for \"{0}\"")]
    MissingSummaryHandler(Phase),

    /// Span error.
    #[error("Span error: {0}")]
    Span(#[from] SpanError),

    /// Summary, export or hook error.
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Result type alias for the phase controller.
pub type Result<T> = std::result::Result<T, InstrumentationError>;

/// State held for one phase.
#[derive(Debug, Default)]
pub struct PhaseRecord {
    cookie: Option<Cookie>,
    node: Option<NodeId>,
    count: u64,
}

impl PhaseRecord {
    /// Whether the phase is started and not yet reported.
    pub fn is_started(&self) -> bool {
        self.cookie.is_some()
    }

    /// Node of the most recent start.
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Completed reports; only advanced for `build`.
    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Outcome of a phase report.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseReport {
    /// Reported phase.
    pub phase: Phase,
    /// Phase summary.
    pub summary: PhaseSummary,
    /// Number of nodes in the phase's sub-tree.
    pub node_count: usize,
    /// Visualization file, if one was written.
    pub viz_path: Option<PathBuf>,
}

/// Builder for [`Instrumentation`].
pub struct InstrumentationBuilder {
    config: InstrumentationConfig,
    session: Option<Session>,
    init_cookie: Option<Cookie>,
    addons: Vec<Arc<dyn InstrumentationAddon>>,
    summarizers: HashMap<Phase, Box<dyn PhaseSummarizer>>,
}

impl InstrumentationBuilder {
    /// Create a builder with the default summarizers.
    pub fn new() -> Self {
        let mut summarizers: HashMap<Phase, Box<dyn PhaseSummarizer>> = HashMap::new();
        summarizers.insert(Phase::Init, Box::new(TotalTimeSummarizer));
        summarizers.insert(Phase::Build, Box::new(BuildSummarizer));
        summarizers.insert(Phase::Command, Box::new(TotalTimeSummarizer));
        summarizers.insert(Phase::Shutdown, Box::new(TotalTimeSummarizer));

        Self {
            config: InstrumentationConfig::default(),
            session: None,
            init_cookie: None,
            addons: Vec::new(),
            summarizers,
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: InstrumentationConfig) -> Self {
        self.config = config;
        self
    }

    /// Set only the enablement source.
    pub fn with_enablement(mut self, enablement: Enablement) -> Self {
        self.config = self.config.with_enablement(enablement);
        self
    }

    /// Record into an existing session instead of a fresh one.
    ///
    /// The session's enablement replaces the configured one.
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Adopt an `init` span the launcher already started on the session.
    ///
    /// A sentinel cookie is ignored and `init` is started as if none was
    /// supplied.
    pub fn with_init_cookie(mut self, cookie: Cookie) -> Self {
        self.init_cookie = Some(cookie);
        self
    }

    /// Register an addon.
    pub fn with_addon(mut self, addon: Arc<dyn InstrumentationAddon>) -> Self {
        self.addons.push(addon);
        self
    }

    /// Replace the summarizer for a phase.
    pub fn with_summarizer(mut self, phase: Phase, summarizer: Box<dyn PhaseSummarizer>) -> Self {
        self.summarizers.insert(phase, summarizer);
        self
    }

    /// Drop every default summarizer.
    pub fn without_default_summarizers(mut self) -> Self {
        self.summarizers.clear();
        self
    }

    /// Build the controller.
    ///
    /// When instrumentation is enabled and no init cookie was supplied, the
    /// `init` phase is started here and an advisory is logged.
    pub fn build(self) -> Result<Instrumentation> {
        let mut config = self.config;
        let session = match self.session {
            Some(session) => {
                if session.enablement() != config.enablement {
                    debug!(
                        configured = ?config.enablement,
                        session = ?session.enablement(),
                        "Using the session's enablement"
                    );
                }
                config.enablement = session.enablement();
                session
            }
            None => Session::with_enablement(config.enablement),
        };

        let dispatcher = HookDispatcher::new();
        for addon in self.addons {
            dispatcher.register(addon);
        }

        let mut records: HashMap<Phase, PhaseRecord> =
            Phase::ALL.iter().map(|phase| (*phase, PhaseRecord::default())).collect();

        let init_cookie = self.init_cookie.filter(|cookie| !cookie.is_sentinel());
        let adopted = init_cookie.is_some();
        if let Some(cookie) = init_cookie {
            let init = records.entry(Phase::Init).or_default();
            init.node = cookie.node();
            init.cookie = Some(cookie);
        }

        let mut instrumentation = Instrumentation {
            session,
            config,
            records,
            summarizers: self.summarizers,
            dispatcher,
        };

        if !adopted && instrumentation.is_enabled() {
            instrumentation.start_phase(Phase::Init)?;
            warn!("{}", MISSING_INIT_ADVISORY);
        }

        debug!(
            session_id = %instrumentation.session.id(),
            enabled = instrumentation.is_enabled(),
            addons = instrumentation.dispatcher.len(),
            "Instrumentation created"
        );
        Ok(instrumentation)
    }
}

impl Default for InstrumentationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Phase controller.
pub struct Instrumentation {
    session: Session,
    config: InstrumentationConfig,
    records: HashMap<Phase, PhaseRecord>,
    summarizers: HashMap<Phase, Box<dyn PhaseSummarizer>>,
    dispatcher: HookDispatcher,
}

impl Instrumentation {
    /// Create a controller builder.
    pub fn builder() -> InstrumentationBuilder {
        InstrumentationBuilder::new()
    }

    /// Create a controller gated by the environment.
    pub fn new() -> Result<Self> {
        InstrumentationBuilder::new().build()
    }

    /// Whether instrumentation is enabled, as seen by the session.
    pub fn is_enabled(&self) -> bool {
        self.session.is_enabled()
    }

    /// Whether visualization export is enabled, as seen by the session.
    pub fn is_viz_enabled(&self) -> bool {
        self.session.enablement().viz_enabled()
    }

    /// The configuration.
    pub fn config(&self) -> &InstrumentationConfig {
        &self.config
    }

    /// The recording session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The recording session, for starting spans inside a phase.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// The addon dispatcher.
    pub fn dispatcher(&self) -> &HookDispatcher {
        &self.dispatcher
    }

    /// State of a phase.
    pub fn record(&self, phase: Phase) -> Option<&PhaseRecord> {
        self.records.get(&phase)
    }

    /// Number of completed `build` reports.
    pub fn build_count(&self) -> u64 {
        self.record(Phase::Build).map_or(0, PhaseRecord::count)
    }

    /// Start a phase by name.
    ///
    /// A no-op while instrumentation is disabled. Starting a phase again
    /// replaces its cookie.
    pub fn start(&mut self, name: &str) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let phase = parse_phase(name)?;
        self.start_phase(phase)
    }

    fn start_phase(&mut self, phase: Phase) -> Result<()> {
        let cookie = self.session.start(phase.label())?;
        let record = self.records.entry(phase).or_default();
        record.node = cookie.node();
        record.cookie = Some(cookie);
        debug!(phase = %phase, node = ?record.node, "Phase started");
        Ok(())
    }

    /// Stop a phase and report it.
    ///
    /// Stops the phase's span, summarizes its sub-tree, calls the addon
    /// hooks and writes the visualization file when enabled. Returns
    /// `Ok(None)` while instrumentation is disabled.
    ///
    /// # Errors
    ///
    /// Fails on an unknown phase name, a phase that was not started, a
    /// missing summarizer, a span stop-order violation, a failing hook or a
    /// failed file write. A stop-order violation leaves the phase started,
    /// so the report can be retried once the inner spans are closed.
    pub fn stop_and_report(&mut self, name: &str, args: ReportArgs) -> Result<Option<PhaseReport>> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let phase = parse_phase(name)?;

        let record = self.records.entry(phase).or_default();
        let (Some(cookie), Some(node)) = (record.cookie.as_ref(), record.node) else {
            return Err(InstrumentationError::NotStarted(phase));
        };
        self.session.check_stop(cookie)?;
        let build_count = record.count;
        if let Some(cookie) = record.cookie.take() {
            self.session.stop(cookie)?;
        }

        let summarizer = self
            .summarizers
            .get(&phase)
            .ok_or(InstrumentationError::MissingSummaryHandler(phase))?;

        let tree = self.session.subtree(node)?;
        let ctx = SummaryContext {
            phase,
            build_count,
            changed_files_limit: self.config.changed_files_limit,
            args: &args,
        };
        let summary = summarizer.summarize(&tree, &ctx)?;
        let info = InstrumentationInfo { summary, tree };

        self.dispatcher.dispatch(phase, &info)?;

        let viz_path = if self.session.enablement().viz_enabled() {
            Some(write_viz_file(&self.config.viz_dir, phase, build_count, &info)?)
        } else {
            None
        };

        let report = PhaseReport {
            phase,
            node_count: info.tree.len(),
            summary: info.summary,
            viz_path,
        };

        if phase == Phase::Build {
            if let Some(record) = self.records.get_mut(&phase) {
                record.count += 1;
            }
        }

        info!(
            phase = %phase,
            total_time_ns = report.summary.total_time(),
            nodes = report.node_count,
            "Phase reported"
        );
        Ok(Some(report))
    }
}

impl std::fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumentation")
            .field("session_id", &self.session.id())
            .field("config", &self.config)
            .field("records", &self.records)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

fn parse_phase(name: &str) -> Result<Phase> {
    name.parse()
        .map_err(|_| InstrumentationError::UnknownPhase(name.to_string()))
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Main types
    pub use crate::{
        Instrumentation, InstrumentationBuilder, InstrumentationError, PhaseRecord, PhaseReport,
    };

    // Core types
    pub use trellis_core::{
        Cookie, Enablement, InstrumentationConfig, NodeId, NodeRef, Phase, Session, SpanLabel,
        StatRecord, SubTree,
    };

    // Observability types
    pub use trellis_observe::{
        BuildResult, CollectingAddon, HookDispatcher, InstrumentationAddon, InstrumentationInfo,
        LoggingAddon, PhaseSummarizer, PhaseSummary, ReportArgs, ResultAnnotation, VizDocument,
    };

    // Common std types
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_observe::{BuildResult, CollectingAddon, HookError, ResultAnnotation};

    struct FailingAddon;

    impl InstrumentationAddon for FailingAddon {
        fn name(&self) -> &str {
            "failing"
        }

        fn supports_phase_hook(&self) -> bool {
            true
        }

        fn instrumentation(
            &self,
            phase: Phase,
            _info: &InstrumentationInfo<'_>,
        ) -> std::result::Result<(), HookError> {
            if phase == Phase::Build {
                return Err("build hook exploded".into());
            }
            Ok(())
        }
    }

    fn run_build(instrumentation: &mut Instrumentation) -> Result<Option<PhaseReport>> {
        instrumentation.start("build").unwrap();
        let session = instrumentation.session_mut();
        let step = session.start(trellis_core::SpanLabel::build_node("babel")).unwrap();
        step.stop(session).unwrap();
        instrumentation.stop_and_report("build", build_args())
    }

    fn enabled() -> Instrumentation {
        Instrumentation::builder()
            .with_enablement(Enablement::instrumentation_only())
            .build()
            .unwrap()
    }

    fn build_args() -> ReportArgs {
        ReportArgs::build(
            BuildResult::new("dist", vec!["assets/app.js".to_string()]),
            ResultAnnotation::initial(),
        )
    }

    #[test]
    fn test_bootstrap_starts_init() {
        let instrumentation = enabled();
        let init = instrumentation.record(Phase::Init).unwrap();
        assert!(init.is_started());
        assert_eq!(instrumentation.session().current(), init.node().unwrap());
    }

    #[test]
    fn test_adopted_init_cookie_is_not_restarted() {
        let mut session = Session::with_enablement(Enablement::instrumentation_only());
        let cookie = session.start(Phase::Init.label()).unwrap();
        let node = cookie.node();

        let mut instrumentation = Instrumentation::builder()
            .with_enablement(Enablement::instrumentation_only())
            .with_session(session)
            .with_init_cookie(cookie)
            .build()
            .unwrap();

        assert_eq!(instrumentation.record(Phase::Init).unwrap().node(), node);
        assert_eq!(instrumentation.session().tree().len(), 2);

        let report = instrumentation
            .stop_and_report("init", ReportArgs::None)
            .unwrap()
            .unwrap();
        assert_eq!(report.node_count, 1);
    }

    #[test]
    fn test_disabled_is_noop() {
        let mut instrumentation = Instrumentation::builder()
            .with_enablement(Enablement::disabled())
            .build()
            .unwrap();

        assert!(!instrumentation.record(Phase::Init).unwrap().is_started());
        instrumentation.start("build").unwrap();
        instrumentation.start("bogus").unwrap();
        assert!(instrumentation.stop_and_report("build", build_args()).unwrap().is_none());
        assert!(instrumentation.stop_and_report("bogus", ReportArgs::None).unwrap().is_none());
        assert_eq!(instrumentation.session().tree().len(), 1);
    }

    #[test]
    fn test_unknown_phase() {
        let mut instrumentation = enabled();
        let err = instrumentation.start("foo").unwrap_err();
        assert!(matches!(err, InstrumentationError::UnknownPhase(ref name) if name == "foo"));
        assert_eq!(err.to_string(), "No such instrumentation \"foo\"");

        let err = instrumentation.stop_and_report("foo", ReportArgs::None).unwrap_err();
        assert!(matches!(err, InstrumentationError::UnknownPhase(_)));
    }

    #[test]
    fn test_not_started() {
        let mut instrumentation = enabled();
        let err = instrumentation.stop_and_report("command", ReportArgs::None).unwrap_err();
        assert!(matches!(err, InstrumentationError::NotStarted(Phase::Command)));
        assert_eq!(
            err.to_string(),
            "Cannot stop instrumentation \"command\".  It has not started."
        );
    }

    #[test]
    fn test_missing_summary_handler() {
        let mut instrumentation = Instrumentation::builder()
            .with_enablement(Enablement::instrumentation_only())
            .without_default_summarizers()
            .build()
            .unwrap();

        let err = instrumentation.stop_and_report("init", ReportArgs::None).unwrap_err();
        assert!(matches!(err, InstrumentationError::MissingSummaryHandler(Phase::Init)));
    }

    #[test]
    fn test_build_reports_count_and_steps() {
        let mut instrumentation = enabled();
        instrumentation.stop_and_report("init", ReportArgs::None).unwrap();

        for expected in 0..2 {
            instrumentation.start("build").unwrap();
            let session = instrumentation.session_mut();
            let step = session.start(trellis_core::SpanLabel::build_node("babel")).unwrap();
            step.stop(session).unwrap();

            let report = instrumentation
                .stop_and_report("build", build_args())
                .unwrap()
                .unwrap();
            let summary = report.summary.as_build().unwrap();
            assert_eq!(summary.build.count, expected);
            assert_eq!(summary.build_steps, 1);
            assert_eq!(summary.output, "dist");
            assert!(report.viz_path.is_none());
        }
        assert_eq!(instrumentation.build_count(), 2);
    }

    #[test]
    fn test_build_without_args_fails() {
        let mut instrumentation = enabled();
        instrumentation.stop_and_report("init", ReportArgs::None).unwrap();
        instrumentation.start("build").unwrap();

        let err = instrumentation.stop_and_report("build", ReportArgs::None).unwrap_err();
        assert!(matches!(
            err,
            InstrumentationError::Report(ReportError::MissingReportArgs { phase: Phase::Build })
        ));
        assert_eq!(instrumentation.build_count(), 0);
    }

    #[test]
    fn test_stop_order_violation_surfaces() {
        let mut instrumentation = enabled();
        let _open = instrumentation.session_mut().start("leaked").unwrap();

        let err = instrumentation.stop_and_report("init", ReportArgs::None).unwrap_err();
        assert!(matches!(err, InstrumentationError::Span(ref e) if e.is_stop_order_violation()));
    }

    #[test]
    fn test_report_retries_after_inner_span_closes() {
        let mut instrumentation = enabled();
        let init = instrumentation.record(Phase::Init).unwrap().node().unwrap();
        let leaked = instrumentation.session_mut().start("leaked").unwrap();

        let err = instrumentation.stop_and_report("init", ReportArgs::None).unwrap_err();
        assert!(matches!(err, InstrumentationError::Span(ref e) if e.is_stop_order_violation()));
        assert!(instrumentation.record(Phase::Init).unwrap().is_started());

        leaked.stop(instrumentation.session_mut()).unwrap();
        assert_eq!(instrumentation.session().current(), init);

        let report = instrumentation
            .stop_and_report("init", ReportArgs::None)
            .unwrap()
            .unwrap();
        assert_eq!(report.node_count, 2);
        assert_eq!(instrumentation.session().current(), NodeId::ROOT);
    }

    #[test]
    fn test_session_enablement_wins_over_config() {
        let mut instrumentation = Instrumentation::builder()
            .with_enablement(Enablement::instrumentation_only())
            .with_session(Session::with_enablement(Enablement::disabled()))
            .build()
            .unwrap();

        assert!(!instrumentation.is_enabled());
        assert_eq!(instrumentation.config().enablement, Enablement::disabled());
        instrumentation.start("command").unwrap();
        assert!(instrumentation.stop_and_report("command", ReportArgs::None).unwrap().is_none());
    }

    #[test]
    fn test_enabled_session_under_disabled_config() {
        let mut instrumentation = Instrumentation::builder()
            .with_enablement(Enablement::disabled())
            .with_session(Session::with_enablement(Enablement::instrumentation_only()))
            .build()
            .unwrap();

        assert!(instrumentation.is_enabled());
        instrumentation.stop_and_report("init", ReportArgs::None).unwrap();
        instrumentation.start("command").unwrap();
        let report = instrumentation
            .stop_and_report("command", ReportArgs::None)
            .unwrap()
            .unwrap();
        assert_eq!(report.phase, Phase::Command);
    }

    #[test]
    fn test_sentinel_init_cookie_is_not_adopted() {
        let mut disabled = Session::with_enablement(Enablement::disabled());
        let sentinel = disabled.start(Phase::Init.label()).unwrap();
        assert!(sentinel.is_sentinel());

        let mut instrumentation = Instrumentation::builder()
            .with_enablement(Enablement::instrumentation_only())
            .with_init_cookie(sentinel)
            .build()
            .unwrap();

        let init = instrumentation.record(Phase::Init).unwrap();
        assert!(init.is_started());
        assert!(init.node().is_some());
        assert!(instrumentation.stop_and_report("init", ReportArgs::None).unwrap().is_some());
    }

    #[test]
    fn test_failing_hook_skips_export_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut instrumentation = Instrumentation::builder()
            .with_config(
                InstrumentationConfig::new()
                    .with_enablement(Enablement::with_viz())
                    .with_viz_dir(dir.path()),
            )
            .with_addon(Arc::new(FailingAddon))
            .build()
            .unwrap();
        instrumentation.stop_and_report("init", ReportArgs::None).unwrap();

        let err = run_build(&mut instrumentation).unwrap_err();
        assert!(matches!(
            err,
            InstrumentationError::Report(ReportError::Hook { ref addon, .. }) if addon == "failing"
        ));
        assert_eq!(instrumentation.build_count(), 0);
        assert!(!dir.path().join("broccoli-viz.build.0.json").exists());
        assert!(dir.path().join("broccoli-viz.init.json").exists());
    }

    #[test]
    fn test_viz_write_failure_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let mut instrumentation = Instrumentation::builder()
            .with_config(
                InstrumentationConfig::new()
                    .with_enablement(Enablement::with_viz())
                    .with_viz_dir(dir.path().join("missing")),
            )
            .build()
            .unwrap();

        let err = instrumentation.stop_and_report("init", ReportArgs::None).unwrap_err();
        assert!(matches!(err, InstrumentationError::Report(ReportError::ExportWrite { .. })));

        let err = run_build(&mut instrumentation).unwrap_err();
        assert!(matches!(err, InstrumentationError::Report(ReportError::ExportWrite { .. })));
        assert_eq!(instrumentation.build_count(), 0);
    }

    #[test]
    fn test_hooks_receive_reports() {
        let addon = Arc::new(CollectingAddon::phase_hook("collector"));
        let mut instrumentation = Instrumentation::builder()
            .with_enablement(Enablement::instrumentation_only())
            .with_addon(Arc::clone(&addon) as Arc<dyn InstrumentationAddon>)
            .build()
            .unwrap();

        instrumentation.stop_and_report("init", ReportArgs::None).unwrap();
        instrumentation.start("command").unwrap();
        instrumentation.stop_and_report("command", ReportArgs::None).unwrap();

        let phases: Vec<Option<Phase>> = addon.invocations().iter().map(|i| i.phase).collect();
        assert_eq!(phases, vec![Some(Phase::Init), Some(Phase::Command)]);
    }
}
