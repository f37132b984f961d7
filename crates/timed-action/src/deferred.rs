//! Deferred results
//!
//! A [`Deferred`] pairs the caller-facing [`Settlement`] with the resolver
//! that settles it. The coordinator owns the resolver; callers only ever
//! see settlements.

use crate::error::Cancelled;
use futures::future::{FutureExt, Shared};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Outcome of one scheduling cycle, awaitable by any number of callers
///
/// Resolves to `Ok(())` after the action ran, or `Err(Cancelled)` when the
/// pending action was cancelled. Clones share one underlying result, so
/// identity can be compared with [`Settlement::ptr_eq`] or `==`.
#[derive(Clone)]
pub struct Settlement {
    cycle: u64,
    inner: Shared<oneshot::Receiver<()>>,
}

impl Settlement {
    /// Sequence number of the deferred result this settlement belongs to
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Whether both settlements are the same deferred result
    pub fn ptr_eq(&self, other: &Settlement) -> bool {
        self.inner.ptr_eq(&other.inner)
    }
}

impl Future for Settlement {
    type Output = Result<(), Cancelled>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped resolver means the cycle ended without running the action
        self.inner.poll_unpin(cx).map(|res| res.map_err(|_| Cancelled))
    }
}

impl PartialEq for Settlement {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Settlement {}

impl fmt::Debug for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settlement")
            .field("cycle", &self.cycle)
            .finish()
    }
}

/// Settlement plus its resolver
pub(crate) struct Deferred {
    settlement: Settlement,
    resolver: oneshot::Sender<()>,
}

impl Deferred {
    pub(crate) fn new(cycle: u64) -> Self {
        let (resolver, rx) = oneshot::channel();
        Self {
            settlement: Settlement {
                cycle,
                inner: rx.shared(),
            },
            resolver,
        }
    }

    pub(crate) fn cycle(&self) -> u64 {
        self.settlement.cycle
    }

    pub(crate) fn settlement(&self) -> Settlement {
        self.settlement.clone()
    }

    /// Fulfill the settlement
    pub(crate) fn resolve(self) {
        // Nobody awaiting is fine
        let _ = self.resolver.send(());
    }

    /// Reject the settlement with [`Cancelled`]
    pub(crate) fn reject(self) {
        drop(self.resolver);
    }
}
