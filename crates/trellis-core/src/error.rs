//! Core error types for Trellis.
//!
//! Errors raised here are caller bugs: a span stopped out of order, a cookie
//! presented to the wrong session, or a statistic touched for a monitor that
//! was never registered. None of them are retried.

use thiserror::Error;

use crate::tree::NodeId;

/// Errors raised by the span tree, the session and the statistic registries.
#[derive(Debug, Error)]
pub enum SpanError {
    /// A cookie was stopped while a different node was the innermost open node.
    #[error("Invalid stop order: node {actual} stopped while node {expected} is innermost")]
    InvalidStopOrder {
        /// The node that is currently innermost.
        expected: NodeId,
        /// The node the cookie refers to.
        actual: NodeId,
    },

    /// The cookie was issued by a different session.
    #[error("Invalid stop order: cookie does not belong to this session")]
    ForeignCookie,

    /// A statistic was requested for a monitor that was never registered.
    #[error("Unknown monitor: '{0}'")]
    UnknownMonitor(String),

    /// A monitor with this name is already registered.
    #[error("Monitor already registered: '{0}'")]
    MonitorAlreadyRegistered(String),

    /// A node id does not exist in this session's tree.
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),
}

impl SpanError {
    /// Whether this error signals a violation of the LIFO stop discipline.
    pub fn is_stop_order_violation(&self) -> bool {
        matches!(
            self,
            SpanError::InvalidStopOrder { .. } | SpanError::ForeignCookie
        )
    }
}

/// Result type alias for span and session operations.
pub type SpanResult<T> = std::result::Result<T, SpanError>;
