use std::sync::{Arc, Condvar, Mutex};

use crate::utils::lock;

/// Single-shot gate: `wait` blocks until some thread calls `signal`.
#[derive(Clone, Default)]
pub struct SyncPoint {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl SyncPoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        let (reached, cvar) = &*self.state;
        *lock(reached) = true;
        cvar.notify_all();
    }

    pub fn wait(&self) {
        let (reached, cvar) = &*self.state;
        let mut reached = lock(reached);
        while !*reached {
            reached = cvar
                .wait(reached)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    pub fn is_signaled(&self) -> bool {
        *lock(&self.state.0)
    }
}
