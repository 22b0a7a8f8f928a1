//! Enablement and configuration for Trellis.
//!
//! Instrumentation is switched on by environment variables that are read on
//! every query rather than cached, so a process can toggle them between
//! phases. Embedders and tests can pin the flags with [`Enablement::Fixed`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

/// Environment variable that enables the instrumentation subsystem.
pub const INSTRUMENTATION_ENV: &str = "EMBER_CLI_INSTRUMENTATION";

/// Environment variable that enables visualization export.
pub const VIZ_ENV: &str = "BROCCOLI_VIZ";

/// Default number of changed files kept in a rebuild summary.
pub const DEFAULT_CHANGED_FILES_LIMIT: usize = 10;

static VIZ_WARNING_EMITTED: AtomicBool = AtomicBool::new(false);

/// Classification of a `BROCCOLI_VIZ` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VizFlag {
    /// Unset or empty.
    Disabled,
    /// Exactly `"1"`.
    Enabled,
    /// Any other non-empty value. Enables export but earns a warning.
    NonCanonical(String),
}

impl VizFlag {
    /// Classify a raw environment value.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            None | Some("") => VizFlag::Disabled,
            Some("1") => VizFlag::Enabled,
            Some(other) => VizFlag::NonCanonical(other.to_string()),
        }
    }

    /// Whether this flag enables visualization export.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, VizFlag::Disabled)
    }

    /// The advisory printed for non-canonical values.
    pub fn advisory(&self) -> Option<String> {
        match self {
            VizFlag::NonCanonical(value) => Some(format!(
                "Please set BROCCOLI_VIZ=1 to enable visual instrumentation, rather than '{}'",
                value
            )),
            _ => None,
        }
    }
}

/// Source of the two enablement flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Enablement {
    /// Read `EMBER_CLI_INSTRUMENTATION` and `BROCCOLI_VIZ` on every query.
    #[default]
    Environment,
    /// Pinned values.
    Fixed {
        /// Whether spans, phases and reports are live.
        instrumentation: bool,
        /// Whether viz files are written.
        viz: bool,
    },
}

impl Enablement {
    /// Everything off.
    pub fn disabled() -> Self {
        Enablement::Fixed {
            instrumentation: false,
            viz: false,
        }
    }

    /// Instrumentation on, viz export off.
    pub fn instrumentation_only() -> Self {
        Enablement::Fixed {
            instrumentation: true,
            viz: false,
        }
    }

    /// Instrumentation and viz export on.
    pub fn with_viz() -> Self {
        Enablement::Fixed {
            instrumentation: true,
            viz: true,
        }
    }

    /// Whether visualization export is enabled.
    ///
    /// With [`Enablement::Environment`] a non-canonical `BROCCOLI_VIZ` value
    /// still enables export, and a warning is logged once per process.
    pub fn viz_enabled(&self) -> bool {
        match self {
            Enablement::Fixed { viz, .. } => *viz,
            Enablement::Environment => {
                let value = std::env::var(VIZ_ENV).ok();
                let flag = VizFlag::parse(value.as_deref());
                if let Some(advisory) = flag.advisory() {
                    if !VIZ_WARNING_EMITTED.swap(true, Ordering::Relaxed) {
                        warn!("{}", advisory);
                    }
                }
                flag.is_enabled()
            }
        }
    }

    /// Whether the instrumentation subsystem is live.
    ///
    /// Visualization implies instrumentation: there is nothing to export
    /// without recorded spans.
    pub fn instrumentation_enabled(&self) -> bool {
        match self {
            Enablement::Fixed {
                instrumentation,
                viz,
            } => *instrumentation || *viz,
            Enablement::Environment => {
                std::env::var(INSTRUMENTATION_ENV).is_ok_and(|v| v == "1") || self.viz_enabled()
            }
        }
    }
}

/// Configuration for the phase controller.
#[derive(Debug, Clone)]
pub struct InstrumentationConfig {
    /// Where the enablement flags come from.
    pub enablement: Enablement,

    /// Directory viz files are written into.
    ///
    /// Defaults to the current working directory.
    pub viz_dir: PathBuf,

    /// Maximum number of changed files listed in a rebuild summary.
    ///
    /// The untruncated count is always reported separately.
    pub changed_files_limit: usize,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            enablement: Enablement::Environment,
            viz_dir: PathBuf::from("."),
            changed_files_limit: DEFAULT_CHANGED_FILES_LIMIT,
        }
    }
}

impl InstrumentationConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the enablement source.
    pub fn with_enablement(mut self, enablement: Enablement) -> Self {
        self.enablement = enablement;
        self
    }

    /// Set the viz output directory.
    pub fn with_viz_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.viz_dir = dir.into();
        self
    }

    /// Set the changed-file truncation limit.
    pub fn with_changed_files_limit(mut self, limit: usize) -> Self {
        self.changed_files_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        // SAFETY: env-mutating tests are serialized.
        unsafe {
            std::env::remove_var(INSTRUMENTATION_ENV);
            std::env::remove_var(VIZ_ENV);
        }
    }

    fn set_env(key: &str, value: &str) {
        // SAFETY: env-mutating tests are serialized.
        unsafe { std::env::set_var(key, value) }
    }

    #[test]
    fn test_viz_flag_parse() {
        assert_eq!(VizFlag::parse(None), VizFlag::Disabled);
        assert_eq!(VizFlag::parse(Some("")), VizFlag::Disabled);
        assert_eq!(VizFlag::parse(Some("1")), VizFlag::Enabled);
        assert_eq!(
            VizFlag::parse(Some("on")),
            VizFlag::NonCanonical("on".to_string())
        );
        assert!(VizFlag::parse(Some("on")).is_enabled());
    }

    #[test]
    fn test_viz_flag_advisory() {
        assert_eq!(VizFlag::Enabled.advisory(), None);
        assert_eq!(
            VizFlag::parse(Some("on")).advisory().unwrap(),
            "Please set BROCCOLI_VIZ=1 to enable visual instrumentation, rather than 'on'"
        );
    }

    #[test]
    fn test_fixed_enablement() {
        assert!(!Enablement::disabled().instrumentation_enabled());
        assert!(Enablement::instrumentation_only().instrumentation_enabled());
        assert!(!Enablement::instrumentation_only().viz_enabled());
        let viz_only = Enablement::Fixed {
            instrumentation: false,
            viz: true,
        };
        assert!(viz_only.instrumentation_enabled());
    }

    #[test]
    #[serial]
    fn test_environment_unset_is_disabled() {
        clear_env();
        let enablement = Enablement::Environment;
        assert!(!enablement.instrumentation_enabled());
        assert!(!enablement.viz_enabled());
    }

    #[test]
    #[serial]
    fn test_environment_instrumentation_requires_exact_one() {
        clear_env();
        set_env(INSTRUMENTATION_ENV, "on");
        assert!(!Enablement::Environment.instrumentation_enabled());

        set_env(INSTRUMENTATION_ENV, "1");
        assert!(Enablement::Environment.instrumentation_enabled());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_environment_is_read_per_query() {
        clear_env();
        let enablement = Enablement::Environment;
        assert!(!enablement.viz_enabled());

        set_env(VIZ_ENV, "1");
        assert!(enablement.viz_enabled());
        assert!(enablement.instrumentation_enabled());

        set_env(VIZ_ENV, "yes please");
        assert!(enablement.viz_enabled());
        clear_env();
    }

    #[test]
    fn test_config_builder() {
        let config = InstrumentationConfig::new()
            .with_enablement(Enablement::with_viz())
            .with_viz_dir("/tmp/viz")
            .with_changed_files_limit(3);

        assert_eq!(config.enablement, Enablement::with_viz());
        assert_eq!(config.viz_dir, PathBuf::from("/tmp/viz"));
        assert_eq!(config.changed_files_limit, 3);
    }
}
