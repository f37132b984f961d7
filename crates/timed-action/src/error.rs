//! Error types for timed actions

use thiserror::Error;

/// Errors raised while building or scheduling a timed action
#[derive(Debug, Error)]
pub enum TimedActionError {
    /// Neither the bound defaults nor the per-call overrides supplied an action
    #[error("no action configured: bind one at construction or pass one when scheduling")]
    MissingAction,

    /// The builder was used outside of a tokio runtime and no handle was given
    #[error("no tokio runtime available to drive timers")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// Timing defaults could not be parsed
    #[error("invalid timing defaults: {0}")]
    InvalidDefaults(#[from] toml::de::Error),
}

/// Rejection reason of a settlement whose pending action was cancelled
///
/// Carries no payload. Treat it only as "did not run".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("timed action was cancelled before it ran")]
pub struct Cancelled;

/// Result type for timed action operations
pub type Result<T> = std::result::Result<T, TimedActionError>;
