//! Deferred action coordinator
//!
//! Owns one pending slot: at most one armed timer plus the deferred result
//! of the current cycle. State machine:
//!
//! ```text
//! IDLE    --schedule-------------> PENDING  (timer armed)
//! PENDING --schedule(skip)-------> PENDING  (no-op, same settlement)
//! PENDING --schedule(restart)----> PENDING  (timer replaced, same settlement)
//! PENDING --timer fires----------> IDLE     (fulfilled, fresh deferred)
//! PENDING --cancel---------------> IDLE     (rejected, fresh deferred)
//! IDLE    --cancel---------------> IDLE     (returns false)
//! ```

use crate::action::Action;
use crate::config::{TimedActionConfig, TimingDefaults};
use crate::deferred::{Deferred, Settlement};
use crate::error::{Result, TimedActionError};
use parking_lot::Mutex;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Coalesces repeated schedule requests into a single timed execution
///
/// Use [`TimedAction::builder`] to bind defaults (bound mode), or
/// [`TimedAction::new`] and [`TimedAction::schedule_action`] to pass the
/// action per call (dynamic mode).
///
/// Dropping a `TimedAction` does not cancel its pending timer. Owners that
/// go away must call [`TimedAction::cancel`] or hold the coordinator in a
/// [`ScopedTimedAction`](crate::ScopedTimedAction).
pub struct TimedAction {
    /// Diagnostic id, only used in log events
    id: Option<Arc<str>>,

    /// Defaults bound at construction
    defaults: TimedActionConfig,

    /// Arm a no-op timer instead of failing when no action resolves
    noop_when_missing: bool,

    /// Runtime that drives the timers
    runtime: Handle,

    /// Pending slot, shared with the armed timer task
    slot: Arc<Mutex<Slot>>,
}

/// The single pending slot
struct Slot {
    /// Armed timer, if any
    timer: Option<ArmedTimer>,

    /// Deferred result handed to callers of the current cycle
    deferred: Deferred,

    /// Cycle number for the next deferred
    next_cycle: u64,

    /// Bumped on every arm so a superseded timer task can't fire
    generation: u64,
}

struct ArmedTimer {
    generation: u64,
    task: JoinHandle<()>,
}

impl Slot {
    fn new(id: Option<&str>) -> Self {
        debug!(id, cycle = 0, "creating new deferred");
        Self {
            timer: None,
            deferred: Deferred::new(0),
            next_cycle: 1,
            generation: 0,
        }
    }

    /// Install a fresh deferred and hand back the one it replaces
    fn renew(&mut self, id: Option<&str>) -> Deferred {
        let cycle = self.next_cycle;
        self.next_cycle += 1;
        debug!(id, cycle, "creating new deferred");
        std::mem::replace(&mut self.deferred, Deferred::new(cycle))
    }
}

impl TimedAction {
    /// Dynamic-mode coordinator on the current tokio runtime
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Bound-mode coordinator on the current tokio runtime
    pub fn bound(action: Action, delay: Duration, skip_if_pending: bool) -> Result<Self> {
        Self::builder()
            .action(action)
            .delay(delay)
            .skip_if_pending(skip_if_pending)
            .build()
    }

    /// Start building a coordinator
    pub fn builder() -> TimedActionBuilder {
        TimedActionBuilder::default()
    }

    /// Diagnostic id
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Defaults bound at construction
    pub fn defaults(&self) -> &TimedActionConfig {
        &self.defaults
    }

    /// Schedule using only the bound defaults
    pub fn schedule(&self) -> Result<Settlement> {
        self.schedule_with(&TimedActionConfig::default())
    }

    /// Schedule with per-call overrides
    ///
    /// Bound defaults that are present mask the matching override fields.
    /// When a timer would be armed and no action resolves, fails with
    /// [`TimedActionError::MissingAction`] unless the coordinator was built
    /// with `noop_when_missing(true)`. A skip call on a pending slot ignores
    /// the action entirely and returns the pending settlement. A failed call
    /// changes nothing.
    pub fn schedule_with(&self, overrides: &TimedActionConfig) -> Result<Settlement> {
        let resolved = self.defaults.resolve(overrides);
        let action = resolved.action;
        self.enqueue(resolved.delay, resolved.skip_if_pending, || match action {
            Some(action) => Ok(action),
            None if self.noop_when_missing => {
                debug!(id = self.id(), "no action configured, arming no-op");
                Ok(Action::noop())
            }
            None => Err(TimedActionError::MissingAction),
        })
    }

    /// Schedule with an explicit action, delay and skip policy
    pub fn schedule_action(
        &self,
        action: Action,
        delay: Duration,
        skip_if_pending: bool,
    ) -> Settlement {
        let overrides = TimedActionConfig::default()
            .with_delay(delay)
            .with_skip_if_pending(skip_if_pending);
        let resolved = self.defaults.resolve(&overrides);
        let action = resolved.action.unwrap_or(action);
        match self.enqueue(resolved.delay, resolved.skip_if_pending, || {
            Ok::<_, Infallible>(action)
        }) {
            Ok(settlement) => settlement,
            Err(never) => match never {},
        }
    }

    /// Cancel the pending action
    ///
    /// Returns false when nothing was pending. Otherwise the timer is
    /// cleared, the current settlement rejects with
    /// [`Cancelled`](crate::Cancelled) and a fresh deferred is installed.
    pub fn cancel(&self) -> bool {
        let id = self.id();
        let timer = {
            let mut slot = self.slot.lock();
            let Some(timer) = slot.timer.take() else {
                return false;
            };
            debug!(id, cycle = slot.deferred.cycle(), "cancelling and rejecting deferred");
            slot.renew(id).reject();
            timer
        };

        timer.task.abort();
        true
    }

    /// Whether a timer is currently armed
    pub fn is_pending(&self) -> bool {
        self.slot.lock().timer.is_some()
    }

    /// Settlement of the current cycle, without scheduling anything
    pub fn current(&self) -> Settlement {
        self.slot.lock().deferred.settlement()
    }

    /// Arm a timer unless a skip call finds one pending
    ///
    /// `action` is only consulted when a timer is actually armed.
    fn enqueue<E>(
        &self,
        delay: Duration,
        skip_if_pending: bool,
        action: impl FnOnce() -> std::result::Result<Action, E>,
    ) -> std::result::Result<Settlement, E> {
        let id = self.id();
        let mut slot = self.slot.lock();

        if slot.timer.is_some() && skip_if_pending {
            debug!(id, cycle = slot.deferred.cycle(), "already enqueued, returning same settlement");
            return Ok(slot.deferred.settlement());
        }

        let action = action()?;

        slot.generation += 1;
        let generation = slot.generation;
        let task = self.runtime.spawn(fire_after(
            Arc::clone(&self.slot),
            self.id.clone(),
            generation,
            action,
            delay,
        ));

        if task.is_finished() {
            // Runtime already shut down; the timer can never fire
            warn!(id, cycle = slot.deferred.cycle(), "runtime is gone, rejecting deferred");
            let superseded = slot.timer.take();
            let settlement = slot.deferred.settlement();
            slot.renew(id).reject();
            drop(slot);
            if let Some(timer) = superseded {
                timer.task.abort();
            }
            return Ok(settlement);
        }

        // Restart keeps the deferred; only the timer is replaced
        let superseded = slot.timer.replace(ArmedTimer { generation, task });
        let settlement = slot.deferred.settlement();
        if superseded.is_some() {
            debug!(id, cycle = settlement.cycle(), ?delay, "restarted timer");
        } else {
            debug!(id, cycle = settlement.cycle(), ?delay, "enqueued");
        }
        drop(slot);

        if let Some(timer) = superseded {
            timer.task.abort();
        }
        Ok(settlement)
    }
}

impl std::fmt::Debug for TimedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedAction")
            .field("id", &self.id)
            .field("defaults", &self.defaults)
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Timer task body
///
/// Unlike a plain "run, then clear" timer, the slot is cleared and renewed
/// before the action runs. `is_pending()` is already false inside the
/// action, and a skip schedule made from the action starts a new cycle
/// rather than joining the one being fulfilled. This lets the action call
/// back into the coordinator without its new timer being clobbered.
///
/// If the action panics the old resolver is dropped unsettled and its
/// waiters see `Cancelled`.
async fn fire_after(
    slot: Arc<Mutex<Slot>>,
    id: Option<Arc<str>>,
    generation: u64,
    action: Action,
    delay: Duration,
) {
    let mut guard = UnfiredTimer {
        slot,
        id,
        generation,
        armed: true,
    };

    tokio::time::sleep(delay).await;

    let id = guard.id.as_deref();
    let deferred = {
        let mut slot = guard.slot.lock();
        match slot.timer {
            Some(ref timer) if timer.generation == generation => {}
            // Superseded by a restart or cancel that raced the wake-up
            _ => return,
        }
        slot.timer = None;
        slot.renew(id)
    };
    guard.armed = false;

    debug!(id, cycle = deferred.cycle(), "executing and resolving deferred");
    action.run();
    deferred.resolve();
}

/// Releases the slot when a started timer task is dropped without firing
///
/// Restart and cancel have already moved the slot on, so this only acts
/// when the runtime itself tears the task down.
struct UnfiredTimer {
    slot: Arc<Mutex<Slot>>,
    id: Option<Arc<str>>,
    generation: u64,
    armed: bool,
}

impl Drop for UnfiredTimer {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let id = self.id.as_deref();
        let mut slot = self.slot.lock();
        if !matches!(slot.timer, Some(ref timer) if timer.generation == self.generation) {
            return;
        }
        warn!(id, cycle = slot.deferred.cycle(), "timer dropped by runtime, rejecting deferred");
        slot.timer = None;
        slot.renew(id).reject();
    }
}

/// Builder for [`TimedAction`]
#[derive(Debug, Default)]
pub struct TimedActionBuilder {
    id: Option<String>,
    defaults: TimedActionConfig,
    noop_when_missing: bool,
    runtime: Option<Handle>,
}

impl TimedActionBuilder {
    /// Diagnostic id for log events
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Bind an action
    pub fn action(mut self, action: Action) -> Self {
        self.defaults.action = Some(action);
        self
    }

    /// Bind a delay
    pub fn delay(mut self, delay: Duration) -> Self {
        self.defaults.delay = Some(delay);
        self
    }

    /// Bind a skip policy
    pub fn skip_if_pending(mut self, skip_if_pending: bool) -> Self {
        self.defaults.skip_if_pending = Some(skip_if_pending);
        self
    }

    /// Replace all bound defaults
    pub fn config(mut self, config: TimedActionConfig) -> Self {
        self.defaults = config;
        self
    }

    /// Apply serializable defaults
    ///
    /// Fields absent from `defaults` keep whatever was bound before.
    pub fn defaults(mut self, defaults: &TimingDefaults) -> Self {
        if let Some(ref id) = defaults.id {
            self.id = Some(id.clone());
        }
        let config = defaults.to_config();
        self.defaults.delay = config.delay.or(self.defaults.delay);
        self.defaults.skip_if_pending = config.skip_if_pending.or(self.defaults.skip_if_pending);
        self
    }

    /// Run a no-op instead of failing when no action resolves
    pub fn noop_when_missing(mut self, enabled: bool) -> Self {
        self.noop_when_missing = enabled;
        self
    }

    /// Runtime used to drive timers (default: the current one)
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Build the coordinator
    pub fn build(self) -> Result<TimedAction> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current()?,
        };
        let id: Option<Arc<str>> = self.id.map(Into::into);
        let slot = Slot::new(id.as_deref());

        Ok(TimedAction {
            id,
            defaults: self.defaults,
            noop_when_missing: self.noop_when_missing,
            runtime,
            slot: Arc::new(Mutex::new(slot)),
        })
    }
}
