//! Shared action callbacks

use std::fmt;
use std::sync::Arc;

/// A callback run when a timer fires
///
/// Cheap to clone: bound actions fire once per cycle, so the same callback
/// is shared between the coordinator and every timer it arms.
#[derive(Clone)]
pub struct Action(Arc<dyn Fn() + Send + Sync + 'static>);

impl Action {
    /// Wrap a closure as an action
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// An action that does nothing
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Whether both handles point at the same callback
    pub fn ptr_eq(&self, other: &Action) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn run(&self) {
        (self.0)()
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Action(..)")
    }
}
