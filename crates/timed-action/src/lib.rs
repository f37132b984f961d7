//! Debounced deferred actions
//!
//! This crate provides a single-slot coordinator that:
//! - Coalesces repeated schedule requests into one timed execution
//! - Keeps the pending timer (skip) or restarts it on re-entry
//! - Hands every caller of a cycle the same awaitable settlement
//! - Rejects the settlement on cancellation
//!
//! ```no_run
//! use std::time::Duration;
//! use timed_action::{Action, TimedAction};
//!
//! # async fn demo() -> timed_action::Result<()> {
//! let save = TimedAction::bound(
//!     Action::new(|| println!("saving")),
//!     Duration::from_millis(250),
//!     false,
//! )?;
//!
//! let first = save.schedule()?;
//! let second = save.schedule()?;
//! assert_eq!(first, second);
//!
//! second.await.expect("not cancelled");
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod config;
pub mod coordinator;
pub mod deferred;
pub mod error;
pub mod scope;

// Re-exports
pub use action::Action;
pub use config::{TimedActionConfig, TimingDefaults};
pub use coordinator::{TimedAction, TimedActionBuilder};
pub use deferred::Settlement;
pub use error::{Cancelled, Result, TimedActionError};
pub use scope::ScopedTimedAction;
