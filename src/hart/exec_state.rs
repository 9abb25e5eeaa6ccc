use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::{hart::fault::Fault, utils::lock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Stopped,
    Running,
    Paused,
    /// A fault ended the run.
    InvalidState,
}

struct Inner {
    state: ExecutionState,
    /// Set once the run started; a hart runs at most once.
    started: bool,
}

/// The execution state shared by the controller and the execution thread.
pub struct StateMonitor {
    inner: Mutex<Inner>,
    cvar: Condvar,
}

impl StateMonitor {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ExecutionState::Stopped,
                started: false,
            }),
            cvar: Condvar::new(),
        }
    }

    pub fn state(&self) -> ExecutionState {
        lock(&self.inner).state
    }

    pub fn has_started(&self) -> bool {
        lock(&self.inner).started
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Inner>) -> MutexGuard<'a, Inner> {
        self.cvar.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(
        &self,
        from: &[ExecutionState],
        to: ExecutionState,
    ) -> Result<ExecutionState, Fault> {
        let mut inner = lock(&self.inner);
        if !inner.started || !from.contains(&inner.state) {
            return Err(Fault::InvalidState);
        }

        let old = std::mem::replace(&mut inner.state, to);
        log::debug!("hart: {:?} -> {:?}", old, to);
        self.cvar.notify_all();
        Ok(old)
    }

    /// Leave `Stopped` for the first and only time.
    pub fn start(&self, initial: ExecutionState) -> Result<(), Fault> {
        debug_assert!(matches!(
            initial,
            ExecutionState::Running | ExecutionState::Paused
        ));

        let mut inner = lock(&self.inner);
        if inner.started || inner.state != ExecutionState::Stopped {
            return Err(Fault::InvalidState);
        }

        inner.started = true;
        inner.state = initial;
        log::debug!("hart: Stopped -> {:?}", initial);
        self.cvar.notify_all();
        Ok(())
    }

    pub fn pause(&self) -> Result<(), Fault> {
        self.transition(&[ExecutionState::Running], ExecutionState::Paused)
            .map(|_| ())
    }

    pub fn resume(&self) -> Result<(), Fault> {
        self.transition(&[ExecutionState::Paused], ExecutionState::Running)
            .map(|_| ())
    }

    pub fn stop(&self) -> Result<(), Fault> {
        self.transition(
            &[ExecutionState::Running, ExecutionState::Paused],
            ExecutionState::Stopped,
        )
        .map(|_| ())
    }

    /// The run ended without a fault. A no-op if it already stopped.
    pub(crate) fn halt(&self) {
        let mut inner = lock(&self.inner);
        if inner.state != ExecutionState::InvalidState {
            inner.state = ExecutionState::Stopped;
        }
        self.cvar.notify_all();
    }

    /// The run ended with a fault.
    pub(crate) fn fail(&self) {
        let mut inner = lock(&self.inner);
        inner.started = true;
        inner.state = ExecutionState::InvalidState;
        self.cvar.notify_all();
    }

    /// Block while paused; returns the first non-paused state.
    pub fn wait_while_paused(&self) -> ExecutionState {
        let mut inner = lock(&self.inner);
        while inner.state == ExecutionState::Paused {
            inner = self.wait(inner);
        }
        inner.state
    }

    /// Block while running; returns the first non-running state.
    pub fn wait_while_running(&self) -> ExecutionState {
        let mut inner = lock(&self.inner);
        while inner.state == ExecutionState::Running {
            inner = self.wait(inner);
        }
        inner.state
    }
}

impl Default for StateMonitor {
    fn default() -> Self {
        Self::new()
    }
}
