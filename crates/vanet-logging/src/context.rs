//! Node context for multi-node logging
//!
//! All nodes of a simulation share one thread. [`NodeContextGuard`] marks
//! which node is handling the current event, so every strategy event logged
//! inside the scope carries `node` and simulated `t` from the enclosing span.

use std::cell::RefCell;
use std::time::Duration;

use tracing::span::EnteredSpan;
use vanet_core::NodeId;

/// Node context stored in thread-local storage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeContextData {
    pub node: NodeId,
    /// Simulated time the event is processed at
    pub sim_time: Duration,
}

thread_local! {
    static NODE_CONTEXT: RefCell<Option<NodeContextData>> = const { RefCell::new(None) };
}

/// RAII guard for node context
///
/// Entering sets the current node and opens a `node` span. Dropping closes
/// the span and restores the previous context, so guards nest.
pub struct NodeContextGuard {
    previous: Option<NodeContextData>,
    _span: EnteredSpan,
}

impl NodeContextGuard {
    pub fn enter(node: NodeId, sim_time: Duration) -> Self {
        let data = NodeContextData { node, sim_time };
        let previous = NODE_CONTEXT.with(|ctx| ctx.borrow_mut().replace(data));
        let span = tracing::info_span!("node", node = %node, t = sim_time.as_secs_f64()).entered();

        Self {
            previous,
            _span: span,
        }
    }

    /// Context of the innermost active guard on this thread
    pub fn current() -> Option<NodeContextData> {
        NODE_CONTEXT.with(|ctx| *ctx.borrow())
    }
}

impl Drop for NodeContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        NODE_CONTEXT.with(|ctx| *ctx.borrow_mut() = previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_sets_and_clears() {
        assert!(NodeContextGuard::current().is_none());
        {
            let _guard = NodeContextGuard::enter(NodeId(3), Duration::from_millis(250));
            let ctx = NodeContextGuard::current().unwrap();
            assert_eq!(ctx.node, NodeId(3));
            assert_eq!(ctx.sim_time, Duration::from_millis(250));
        }
        assert!(NodeContextGuard::current().is_none());
    }

    #[test]
    fn test_guards_nest() {
        let _outer = NodeContextGuard::enter(NodeId(1), Duration::ZERO);
        {
            let _inner = NodeContextGuard::enter(NodeId(2), Duration::from_secs(1));
            assert_eq!(NodeContextGuard::current().unwrap().node, NodeId(2));
        }
        assert_eq!(NodeContextGuard::current().unwrap().node, NodeId(1));
    }
}
