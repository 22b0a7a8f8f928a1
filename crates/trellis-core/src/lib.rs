//! Trellis Core - span tree and session engine
//!
//! This crate records nested timing and counter data for a build tool:
//!
//! - [`Session`]: the innermost-open-span pointer and LIFO start/stop discipline
//! - [`SpanTree`]: arena of labeled nodes with pre-order, post-order and
//!   ancestor traversals
//! - [`MonitorRegistry`]: named counter shapes attached to the open node
//! - [`Enablement`]: the `EMBER_CLI_INSTRUMENTATION` / `BROCCOLI_VIZ` gate
//!
//! # Quick Start
//!
//! ```ignore
//! use trellis_core::prelude::*;
//!
//! let mut session = Session::new();
//! session.register_monitor("mystats", StatRecord::new)?;
//!
//! let build = session.start(SpanLabel::build_node("babel"))?;
//! session.stat_increment("mystats", "files", 12)?;
//! build.stop(&mut session)?;
//!
//! for node in session.tree().root().pre_order() {
//!     println!("{} {}ns", node.name(), node.stats().self_time_nanos());
//! }
//! ```
//!
//! # Time Accounting
//!
//! A node accrues self time only while it is the innermost open node.
//! Starting a child pauses the parent's clock and stopping the child resumes
//! it, so `time.self` never includes descendants.

pub mod config;
pub mod error;
pub mod label;
pub mod phase;
pub mod session;
pub mod stats;
pub mod tree;

// Re-export main types at crate root
pub use config::{Enablement, InstrumentationConfig, VizFlag};
pub use error::{SpanError, SpanResult};
pub use label::{BUILD_NODE_FLAG, CACHED_NODE_FLAG, PHASE_MARKER_FLAG, SpanLabel};
pub use phase::{Phase, UnknownPhaseName};
pub use session::{Cookie, Session, SessionId};
pub use stats::{MonitorRegistry, NodeStats, StatRecord};
pub use tree::{Ancestors, NodeId, NodeRef, PostOrder, PreOrder, SpanNode, SpanTree, SubTree};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{Enablement, InstrumentationConfig};
    pub use crate::error::{SpanError, SpanResult};
    pub use crate::label::SpanLabel;
    pub use crate::phase::Phase;
    pub use crate::session::{Cookie, Session};
    pub use crate::stats::StatRecord;
    pub use crate::tree::{NodeId, NodeRef, SubTree};
}
