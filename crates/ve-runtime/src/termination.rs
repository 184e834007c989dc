use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unplaced,
    Active,
    Closing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationState {
    Running,
    Requested,
    Closed,
}

struct Tasks {
    live: usize,
    requested: bool,
}

/// Shutdown rendezvous shared by an entity and its background tasks.
///
/// Requesting drops the only cancel sender, so every listener disconnects at
/// once. Each task holds a [`TaskGuard`]; the requester waits until all guards
/// are gone. A guard dropped for any reason also raises the request, so the
/// first task to leave always takes the others with it.
pub struct Termination {
    cancel: Mutex<Option<Sender<()>>>,
    listener: Receiver<()>,
    tasks: Mutex<Tasks>,
    settled: Condvar,
}

impl Default for Termination {
    fn default() -> Self {
        Self::new()
    }
}

impl Termination {
    pub fn new() -> Self {
        let (cancel, listener) = bounded(0);
        Self {
            cancel: Mutex::new(Some(cancel)),
            listener,
            tasks: Mutex::new(Tasks {
                live: 0,
                requested: false,
            }),
            settled: Condvar::new(),
        }
    }

    pub fn listener(&self) -> Receiver<()> {
        self.listener.clone()
    }

    // Returns true for the caller that actually raised the request.
    pub fn request(&self) -> bool {
        {
            let mut tasks = self.lock_tasks();
            if tasks.requested {
                return false;
            }
            tasks.requested = true;
        }
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.settled.notify_all();
        true
    }

    pub fn is_requested(&self) -> bool {
        self.lock_tasks().requested
    }

    pub fn live_tasks(&self) -> usize {
        self.lock_tasks().live
    }

    pub fn state(&self) -> TerminationState {
        let tasks = self.lock_tasks();
        match (tasks.requested, tasks.live) {
            (false, _) => TerminationState::Running,
            (true, 0) => TerminationState::Closed,
            (true, _) => TerminationState::Requested,
        }
    }

    // None once termination was requested; no task may start after that.
    pub fn enter(self: &Arc<Self>) -> Option<TaskGuard> {
        let mut tasks = self.lock_tasks();
        if tasks.requested {
            return None;
        }
        tasks.live += 1;
        Some(TaskGuard {
            termination: Arc::clone(self),
        })
    }

    pub fn wait_settled(&self) {
        let mut tasks = self.lock_tasks();
        while !(tasks.requested && tasks.live == 0) {
            tasks = self
                .settled
                .wait(tasks)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn wait_settled_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut tasks = self.lock_tasks();
        while !(tasks.requested && tasks.live == 0) {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tasks = self
                .settled
                .wait_timeout(tasks, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    fn leave(&self) {
        {
            let mut tasks = self.lock_tasks();
            tasks.live = tasks.live.saturating_sub(1);
        }
        self.request();
        self.settled.notify_all();
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct TaskGuard {
    termination: Arc<Termination>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.termination.leave();
    }
}
