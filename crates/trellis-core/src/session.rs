//! Session and stop cookies.
//!
//! A [`Session`] owns one span tree and the pointer to its innermost open
//! node. Starting a span nests it under whatever is open; stopping must
//! mirror starts in reverse order. The session is a plain value passed by
//! `&mut` to every start and stop, so it is not shared across threads or
//! async tasks: give each execution context its own session.

use std::time::Instant;

use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::Enablement;
use crate::error::{SpanError, SpanResult};
use crate::label::SpanLabel;
use crate::stats::{MonitorRegistry, StatRecord};
use crate::tree::{NodeId, SpanTree, SubTree};

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One-shot capability to stop a started span.
///
/// Returned by [`Session::start`]. Stopping consumes the cookie, so a span
/// cannot be stopped twice:
///
/// ```compile_fail
/// use trellis_core::{Enablement, Session};
///
/// let mut session = Session::with_enablement(Enablement::instrumentation_only());
/// let cookie = session.start("once").unwrap();
/// cookie.stop(&mut session).unwrap();
/// cookie.stop(&mut session).unwrap();
/// ```
///
/// A cookie issued while instrumentation was disabled is a sentinel whose
/// stop is a no-op.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a span stays open until its cookie is stopped"]
pub struct Cookie {
    session: SessionId,
    node: Option<NodeId>,
}

impl Cookie {
    fn sentinel(session: SessionId) -> Self {
        Self {
            session,
            node: None,
        }
    }

    /// The node this cookie stops, or `None` for a sentinel.
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Whether this cookie was issued while instrumentation was disabled.
    pub fn is_sentinel(&self) -> bool {
        self.node.is_none()
    }

    /// Stop the span. Equivalent to [`Session::stop`].
    pub fn stop(self, session: &mut Session) -> SpanResult<()> {
        session.stop(self)
    }
}

/// A timeline of nested spans.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    enablement: Enablement,
    tree: SpanTree,
    current: NodeId,
    monitors: MonitorRegistry,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a session gated by the environment.
    pub fn new() -> Self {
        Self::with_enablement(Enablement::Environment)
    }

    /// Create a session with an explicit enablement source.
    pub fn with_enablement(enablement: Enablement) -> Self {
        let id = SessionId::new();
        trace!(session_id = %id, "Created session");
        Self {
            id,
            enablement,
            tree: SpanTree::new(),
            current: NodeId::ROOT,
            monitors: MonitorRegistry::new(),
        }
    }

    /// Session ID.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The enablement source this session consults.
    pub fn enablement(&self) -> Enablement {
        self.enablement
    }

    /// Whether starts and stops are currently live.
    pub fn is_enabled(&self) -> bool {
        self.enablement.instrumentation_enabled()
    }

    /// The recorded tree.
    pub fn tree(&self) -> &SpanTree {
        &self.tree
    }

    /// The innermost open node; the synthetic root when nothing is open.
    pub fn current(&self) -> NodeId {
        self.current
    }

    /// The frozen sub-tree rooted at `id`.
    pub fn subtree(&self, id: NodeId) -> SpanResult<SubTree<'_>> {
        self.tree.subtree(id)
    }

    /// Open a new span under the current node.
    ///
    /// Returns a sentinel cookie without touching the tree when
    /// instrumentation is disabled.
    pub fn start(&mut self, label: impl Into<SpanLabel>) -> SpanResult<Cookie> {
        if !self.is_enabled() {
            return Ok(Cookie::sentinel(self.id));
        }

        let label = label.into();
        let now = Instant::now();
        let parent = self.current;

        self.tree.get_mut(parent)?.pause(now);
        let id = self.tree.create_child(parent, label)?;
        let node = self.tree.get_mut(id)?;
        node.resume(now);
        debug!(node = %id, parent = %parent, name = node.label().name(), "Span started");

        self.current = id;
        Ok(Cookie {
            session: self.id,
            node: Some(id),
        })
    }

    /// Check that `cookie` could be stopped now, without consuming it.
    ///
    /// Returns the node the stop would close, or `None` when the stop is a
    /// no-op (sentinel cookie or disabled session).
    ///
    /// # Errors
    ///
    /// Fails with a stop-order error if the cookie belongs to another
    /// session or its node is not the innermost open node.
    pub fn check_stop(&self, cookie: &Cookie) -> SpanResult<Option<NodeId>> {
        let Some(id) = cookie.node else {
            return Ok(None);
        };
        if !self.is_enabled() {
            return Ok(None);
        }
        if cookie.session != self.id {
            return Err(SpanError::ForeignCookie);
        }
        if self.tree.get(id).is_none() {
            return Err(SpanError::UnknownNode(id));
        }
        if id != self.current {
            return Err(SpanError::InvalidStopOrder {
                expected: self.current,
                actual: id,
            });
        }
        Ok(Some(id))
    }

    /// Close the span behind `cookie`.
    ///
    /// # Errors
    ///
    /// Same as [`Session::check_stop`]. On error the tree is untouched.
    pub fn stop(&mut self, cookie: Cookie) -> SpanResult<()> {
        let Some(id) = self.check_stop(&cookie)? else {
            return Ok(());
        };

        let now = Instant::now();
        let node = self.tree.get_mut(id)?;
        node.pause(now);
        node.mark_stopped();
        let parent = node.parent().unwrap_or(NodeId::ROOT);
        debug!(
            node = %id,
            self_nanos = node.stats().self_time_nanos(),
            "Span stopped"
        );

        if parent != NodeId::ROOT {
            self.tree.get_mut(parent)?.resume(now);
        }
        self.current = parent;
        Ok(())
    }

    /// Register a monitor shape for this session.
    ///
    /// # Errors
    ///
    /// Returns [`SpanError::MonitorAlreadyRegistered`] on a second
    /// registration of the same name.
    pub fn register_monitor<F>(&mut self, name: impl Into<String>, factory: F) -> SpanResult<()>
    where
        F: Fn() -> StatRecord + Send + 'static,
    {
        self.monitors.register(name, factory)
    }

    /// Whether a monitor is registered.
    pub fn has_monitor(&self, name: &str) -> bool {
        self.monitors.contains(name)
    }

    /// Overwrite a counter on the current node's record for `monitor`.
    pub fn stat_set(&mut self, monitor: &str, field: &str, value: i64) -> SpanResult<()> {
        self.current_record(monitor)?.set(field, value);
        Ok(())
    }

    /// Add to a counter on the current node's record for `monitor`.
    pub fn stat_increment(&mut self, monitor: &str, field: &str, delta: i64) -> SpanResult<()> {
        self.current_record(monitor)?.increment(field, delta);
        Ok(())
    }

    /// Snapshot of the current node's record for `monitor`, created from the
    /// default shape if this node has not touched it yet.
    pub fn stats_for(&mut self, monitor: &str) -> SpanResult<StatRecord> {
        self.current_record(monitor).map(|record| record.clone())
    }

    fn current_record(&mut self, monitor: &str) -> SpanResult<&mut StatRecord> {
        if !self.monitors.contains(monitor) {
            return Err(SpanError::UnknownMonitor(monitor.to_string()));
        }
        let registry = &self.monitors;
        let node = self.tree.get_mut(self.current)?;
        Ok(node
            .stats_mut()
            .monitors
            .entry(monitor.to_string())
            .or_insert_with(|| registry.instantiate(monitor).unwrap_or_default()))
    }
}
