//! Addon hook dispatch.
//!
//! Each phase report is handed to the registered addons in registration
//! order. An addon either implements the phase hook, which receives every
//! phase, or the legacy build hook, which only receives `build` reports and
//! no phase name. Which one applies is decided once, at registration.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use trellis_core::{Phase, SubTree};

use crate::error::{HookError, ReportError, ReportResult};
use crate::summary::PhaseSummary;

/// Payload delivered to hooks: the phase summary and its frozen sub-tree.
#[derive(Debug, Clone)]
pub struct InstrumentationInfo<'a> {
    /// Phase summary.
    pub summary: PhaseSummary,
    /// The phase's sub-tree.
    pub tree: SubTree<'a>,
}

/// An addon that wants phase reports.
pub trait InstrumentationAddon: Send + Sync {
    /// Addon name, used in logs and errors.
    fn name(&self) -> &str;

    /// Whether [`InstrumentationAddon::instrumentation`] is implemented.
    fn supports_phase_hook(&self) -> bool {
        false
    }

    /// Whether [`InstrumentationAddon::build_instrumentation`] is implemented.
    fn supports_legacy_build_hook(&self) -> bool {
        false
    }

    /// Called for every phase report.
    fn instrumentation(&self, _phase: Phase, _info: &InstrumentationInfo<'_>) -> Result<(), HookError> {
        Ok(())
    }

    /// Called for `build` reports when the phase hook is not supported.
    fn build_instrumentation(&self, _info: &InstrumentationInfo<'_>) -> Result<(), HookError> {
        Ok(())
    }
}

/// Hook resolved for an addon at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Receives every phase.
    Phase,
    /// Receives `build` only, without a phase name.
    LegacyBuild,
    /// Receives nothing.
    None,
}

impl HookKind {
    /// Resolve the hook an addon will receive. The phase hook wins.
    pub fn resolve(addon: &dyn InstrumentationAddon) -> Self {
        if addon.supports_phase_hook() {
            HookKind::Phase
        } else if addon.supports_legacy_build_hook() {
            HookKind::LegacyBuild
        } else {
            HookKind::None
        }
    }

    /// Whether this hook fires for `phase`.
    pub fn fires_for(&self, phase: Phase) -> bool {
        match self {
            HookKind::Phase => true,
            HookKind::LegacyBuild => phase == Phase::Build,
            HookKind::None => false,
        }
    }
}

struct RegisteredAddon {
    addon: Arc<dyn InstrumentationAddon>,
    kind: HookKind,
}

/// Dispatches phase reports to addons.
#[derive(Default)]
pub struct HookDispatcher {
    addons: RwLock<Vec<RegisteredAddon>>,
}

impl HookDispatcher {
    /// Create a dispatcher with no addons.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an addon and return the hook resolved for it.
    pub fn register(&self, addon: Arc<dyn InstrumentationAddon>) -> HookKind {
        let kind = HookKind::resolve(addon.as_ref());
        debug!(addon = addon.name(), hook = ?kind, "Addon registered");
        self.addons.write().push(RegisteredAddon { addon, kind });
        kind
    }

    /// Number of registered addons.
    pub fn len(&self) -> usize {
        self.addons.read().len()
    }

    /// Whether no addons are registered.
    pub fn is_empty(&self) -> bool {
        self.addons.read().is_empty()
    }

    /// Remove all addons.
    pub fn clear(&self) {
        self.addons.write().clear();
    }

    /// Deliver a report to every addon whose hook fires for `phase`.
    ///
    /// Stops at the first failing hook and returns its error. Returns the
    /// number of hooks invoked.
    pub fn dispatch(&self, phase: Phase, info: &InstrumentationInfo<'_>) -> ReportResult<usize> {
        let addons = self.addons.read();
        let mut invoked = 0;

        for entry in addons.iter().filter(|entry| entry.kind.fires_for(phase)) {
            let result = match entry.kind {
                HookKind::Phase => entry.addon.instrumentation(phase, info),
                HookKind::LegacyBuild => entry.addon.build_instrumentation(info),
                HookKind::None => continue,
            };
            result.map_err(|source| ReportError::Hook {
                addon: entry.addon.name().to_string(),
                source,
            })?;
            invoked += 1;
        }

        debug!(phase = %phase, invoked, "Addon hooks dispatched");
        Ok(invoked)
    }
}

impl std::fmt::Debug for HookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookDispatcher")
            .field("addon_count", &self.len())
            .finish()
    }
}

/// An addon that logs every phase report.
pub struct LoggingAddon {
    name: String,
}

impl LoggingAddon {
    /// Create a logging addon.
    pub fn new() -> Self {
        Self {
            name: "logging".to_string(),
        }
    }
}

impl Default for LoggingAddon {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentationAddon for LoggingAddon {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_phase_hook(&self) -> bool {
        true
    }

    fn instrumentation(&self, phase: Phase, info: &InstrumentationInfo<'_>) -> Result<(), HookError> {
        match &info.summary {
            PhaseSummary::Build(summary) => info!(
                phase = %phase,
                count = summary.build.count,
                build_steps = summary.build_steps,
                total_time_ms = summary.total_time / 1_000_000,
                output = %summary.output,
                "Build instrumented"
            ),
            PhaseSummary::Timing(summary) => info!(
                phase = %phase,
                total_time_ms = summary.total_time / 1_000_000,
                nodes = info.tree.len(),
                "Phase instrumented"
            ),
        }
        Ok(())
    }
}

/// One hook invocation seen by a [`CollectingAddon`].
#[derive(Debug, Clone, PartialEq)]
pub struct HookInvocation {
    /// Phase name passed to the hook; `None` for the legacy build hook.
    pub phase: Option<Phase>,
    /// Summary delivered.
    pub summary: PhaseSummary,
    /// Size of the delivered sub-tree.
    pub node_count: usize,
}

/// An addon that records the reports it receives.
pub struct CollectingAddon {
    name: String,
    kind: HookKind,
    invocations: RwLock<Vec<HookInvocation>>,
}

impl CollectingAddon {
    /// Collect through the phase hook.
    pub fn phase_hook(name: impl Into<String>) -> Self {
        Self::with_kind(name, HookKind::Phase)
    }

    /// Collect through the legacy build hook.
    pub fn legacy_build_hook(name: impl Into<String>) -> Self {
        Self::with_kind(name, HookKind::LegacyBuild)
    }

    /// Implement neither hook.
    pub fn without_hooks(name: impl Into<String>) -> Self {
        Self::with_kind(name, HookKind::None)
    }

    fn with_kind(name: impl Into<String>, kind: HookKind) -> Self {
        Self {
            name: name.into(),
            kind,
            invocations: RwLock::new(Vec::new()),
        }
    }

    /// Invocations so far.
    pub fn invocations(&self) -> Vec<HookInvocation> {
        self.invocations.read().clone()
    }

    /// Number of invocations.
    pub fn len(&self) -> usize {
        self.invocations.read().len()
    }

    /// Whether the addon was never invoked.
    pub fn is_empty(&self) -> bool {
        self.invocations.read().is_empty()
    }

    fn record(&self, phase: Option<Phase>, info: &InstrumentationInfo<'_>) {
        self.invocations.write().push(HookInvocation {
            phase,
            summary: info.summary.clone(),
            node_count: info.tree.len(),
        });
    }
}

impl InstrumentationAddon for CollectingAddon {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_phase_hook(&self) -> bool {
        self.kind == HookKind::Phase
    }

    fn supports_legacy_build_hook(&self) -> bool {
        self.kind == HookKind::LegacyBuild
    }

    fn instrumentation(&self, phase: Phase, info: &InstrumentationInfo<'_>) -> Result<(), HookError> {
        self.record(Some(phase), info);
        Ok(())
    }

    fn build_instrumentation(&self, info: &InstrumentationInfo<'_>) -> Result<(), HookError> {
        self.record(None, info);
        Ok(())
    }
}
