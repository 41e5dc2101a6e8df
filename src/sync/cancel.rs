use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// A cooperative cancellation flag, optionally linked to a parent.
///
/// Cancelling a token also cancels its parent, and the parent's parent,
/// up the chain. Cancelling a parent does **not** reach its children: a
/// sub-scope can stop the enclosing scope, but an enclosing scope leaves
/// its sub-scopes running until they observe their own flag.
///
/// Tokens are cheap to clone; clones share the same flag.
///
/// ```rust
/// use framestep::CancellationToken;
///
/// let scope = CancellationToken::new();
/// let child = scope.child();
///
/// child.cancel();
/// assert!(scope.is_cancellation_requested());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Monotonic: only ever goes from `false` to `true`.
    cancelled: AtomicBool,
    parent: Option<CancellationToken>,
}

impl CancellationToken {
    /// Creates a root token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token whose cancellation propagates to `parent`.
    pub fn with_parent(parent: &CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                parent: Some(parent.clone()),
            }),
        }
    }

    /// Creates a child of this token.
    pub fn child(&self) -> Self {
        Self::with_parent(self)
    }

    /// Requests cancellation.
    ///
    /// Only the first call on a token forwards to its parent. Forwarding
    /// stops at the first ancestor that was already cancelled.
    pub fn cancel(&self) {
        let mut current = Some(self);
        let mut depth = 0usize;

        while let Some(token) = current {
            if token.inner.cancelled.swap(true, Ordering::AcqRel) {
                break;
            }
            depth += 1;
            current = token.inner.parent.as_ref();
        }

        if depth > 0 {
            debug!(scopes = depth, "cancellation requested");
        }
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    pub fn parent(&self) -> Option<&CancellationToken> {
        self.inner.parent.as_ref()
    }
}
