//! Common utilities for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use timed_action::Action;

/// Action that counts its invocations
#[derive(Clone)]
pub struct Probe {
    calls: Arc<AtomicUsize>,
}

impl Probe {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn action(&self) -> Action {
        let calls = self.calls.clone();
        Action::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Route tracing output through the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
