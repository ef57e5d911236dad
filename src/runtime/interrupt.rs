//! Cooperative interruption: per-test deadlines and run/task cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{err_msg, SutraError};

/// How many evaluation steps pass between two clock reads.
const CHECK_INTERVAL: u32 = 64;

/// A cloneable cancellation flag, optionally chained to a parent.
///
/// A child token reports cancelled when either it or its parent is cancelled;
/// cancelling a child never affects the parent.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::clone(&self.flag)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self
                .parent
                .as_ref()
                .is_some_and(|p| p.load(Ordering::SeqCst))
    }
}

/// Checked by the evaluator on every step.
#[derive(Debug)]
pub struct Interrupt {
    token: CancellationToken,
    deadline: Option<(Instant, Duration)>,
    ticks: u32,
}

impl Interrupt {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
            ticks: 0,
        }
    }

    /// Arms (or with `None`, disarms) the deadline, counted from now.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.deadline = timeout.map(|t| (Instant::now() + t, t));
        self.ticks = 0;
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cheap check, reading the clock only every few steps.
    pub fn tick(&mut self) -> Result<(), SutraError> {
        self.ticks = self.ticks.wrapping_add(1);
        if self.ticks % CHECK_INTERVAL != 0 {
            return Ok(());
        }
        self.check_now()
    }

    pub fn check_now(&self) -> Result<(), SutraError> {
        if self.token.is_cancelled() {
            return Err(err_msg!(Cancelled, "Execution cancelled"));
        }
        if let Some((deadline, timeout)) = self.deadline {
            if Instant::now() >= deadline {
                return Err(err_msg!(
                    Timeout,
                    "Exceeded timeout of {} ms",
                    timeout.as_millis()
                ));
            }
        }
        Ok(())
    }
}
