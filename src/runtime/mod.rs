//! Thread coordination primitives for the batched importer: the readiness
//! notifier that carries worker completions back to the scheduler, and the
//! process-wide shutdown flag.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::UmbraError;

/// Emitted by a worker when it finishes one unit of work, successfully or
/// not. `unit` is the batch index, for diagnostics; the unit's outcome is
/// read from the batch itself after the token has been received. `fault`
/// carries the one condition a worker cannot recover from on its own (a
/// failed session replacement, or cancellation) and tells the scheduler to
/// stop dispatching.
#[derive(Debug)]
pub struct ReadinessToken {
    pub unit: u64,
    pub fault: Option<UmbraError>,
}

impl ReadinessToken {
    pub fn ready(unit: u64) -> Self {
        Self { unit, fault: None }
    }

    pub fn fault(unit: u64, fault: UmbraError) -> Self {
        Self {
            unit,
            fault: Some(fault),
        }
    }
}

/// FIFO of readiness tokens behind a mutex and condvar. Workers `notify`,
/// the scheduler `await_ready`s exactly once per dispatched unit; the
/// mutex hand-off doubles as the fence that publishes the batch fields the
/// worker wrote before notifying.
#[derive(Clone, Default)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

#[derive(Default)]
struct NotifierInner {
    ready: Mutex<VecDeque<ReadinessToken>>,
    signal: Condvar,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self, token: ReadinessToken) {
        let mut ready = self.inner.ready.lock();
        ready.push_back(token);
        drop(ready);
        self.inner.signal.notify_one();
    }

    /// Blocks until a token is available and takes it.
    pub fn await_ready(&self) -> ReadinessToken {
        let mut ready = self.inner.ready.lock();
        loop {
            if let Some(token) = ready.pop_front() {
                return token;
            }
            self.inner.signal.wait(&mut ready);
        }
    }
}

/// Cooperative cancellation signal shared between the scheduler and its
/// workers. Workers observe it between statements, so a set flag stops the
/// import at the next statement boundary, not mid-query.
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag {
    inner: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}
