//! Process-wide readiness barrier between index construction and searching.
//!
//! Searches block on the gate (no busy-waiting) until the first build
//! completes. Once open the gate stays open across rebuilds, since a rebuild
//! swaps snapshots atomically and never leaves searches without an index.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::IndexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Pending,
    Ready,
    Closed,
}

#[derive(Debug)]
pub struct ReadinessGate {
    state: Mutex<GateState>,
    signal: Condvar,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Pending),
            signal: Condvar::new(),
        }
    }

    /// Mark the index ready and release every waiter.
    pub fn open(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != GateState::Closed {
            *state = GateState::Ready;
        }
        self.signal.notify_all();
    }

    /// Shut the gate for good; current and future waiters fail.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = GateState::Closed;
        self.signal.notify_all();
    }

    pub fn is_ready(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            GateState::Ready
        )
    }

    /// Block until the gate opens.
    ///
    /// Fails with [`IndexError::Unavailable`] when the gate is closed or
    /// `timeout` elapses first.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<(), IndexError> {
        let unavailable = |reason: &str| IndexError::Unavailable {
            reason: reason.to_string(),
        };
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self
            .state
            .lock()
            .map_err(|_| unavailable("readiness lock poisoned"))?;
        loop {
            match *state {
                GateState::Ready => return Ok(()),
                GateState::Closed => return Err(unavailable("engine is shutting down")),
                GateState::Pending => {}
            }
            state = match deadline {
                None => self
                    .signal
                    .wait(state)
                    .map_err(|_| unavailable("readiness lock poisoned"))?,
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(unavailable("timed out waiting for the index build"));
                    }
                    self.signal
                        .wait_timeout(state, remaining)
                        .map_err(|_| unavailable("readiness lock poisoned"))?
                        .0
                }
            };
        }
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}
