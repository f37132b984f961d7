//! Owner-scoped coordinators
//!
//! A pending action must not outlive the thing that scheduled it. Holding
//! the coordinator in a [`ScopedTimedAction`] ties the pending slot to the
//! owner: dropping the guard cancels whatever is still armed.

use crate::coordinator::TimedAction;
use std::ops::Deref;
use tracing::debug;

/// [`TimedAction`] that cancels its pending action when dropped
#[derive(Debug)]
pub struct ScopedTimedAction {
    inner: TimedAction,
}

impl ScopedTimedAction {
    /// Bind `inner` to the lifetime of the returned guard
    pub fn new(inner: TimedAction) -> Self {
        Self { inner }
    }
}

impl From<TimedAction> for ScopedTimedAction {
    fn from(inner: TimedAction) -> Self {
        Self::new(inner)
    }
}

impl Deref for ScopedTimedAction {
    type Target = TimedAction;

    fn deref(&self) -> &TimedAction {
        &self.inner
    }
}

impl Drop for ScopedTimedAction {
    fn drop(&mut self) {
        if self.inner.cancel() {
            debug!(id = self.inner.id(), "owner dropped, pending action cancelled");
        }
    }
}
