//! The four named lifecycle phases.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::label::{PHASE_MARKER_FLAG, SpanLabel};

/// A lifecycle phase of the build tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Process start-up.
    Init,
    /// One build or rebuild.
    Build,
    /// A command invocation.
    Command,
    /// Process tear-down.
    Shutdown,
}

impl Phase {
    /// All phases, in lifecycle order.
    pub const ALL: [Phase; 4] = [Phase::Init, Phase::Build, Phase::Command, Phase::Shutdown];

    /// Phase name as used in labels, hooks and file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Build => "build",
            Phase::Command => "command",
            Phase::Shutdown => "shutdown",
        }
    }

    /// Label for the root span of this phase.
    pub fn label(&self) -> SpanLabel {
        SpanLabel::new(self.as_str()).with_flag(PHASE_MARKER_FLAG, true)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A name outside the fixed set of phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPhaseName(pub String);

impl std::fmt::Display for UnknownPhaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "No such instrumentation \"{}\"", self.0)
    }
}

impl std::error::Error for UnknownPhaseName {}

impl FromStr for Phase {
    type Err = UnknownPhaseName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| UnknownPhaseName(s.to_string()))
    }
}
