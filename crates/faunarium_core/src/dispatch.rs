//! Asynchronous, order-preserving listener dispatch.
//!
//! One [`SharedState`] per environment bundles the simulation state, the
//! FIFO of deferred notification tasks and the shutdown flag behind a
//! single mutex/condvar pair: the same lock every mutator takes. The
//! worker holds that lock for an entire drain, so a task enqueued while
//! a mutator holds the lock cannot run until the mutator releases it,
//! tasks run strictly in enqueue order, and callbacks always observe a
//! state consistent with the mutation that triggered them.
//!
//! Contract for callbacks: treat the lock as already held. A callback
//! that re-acquires it from the dispatch thread deadlocks against its
//! own drain.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

/// A deferred unit of work, normally one listener notification.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// State plus dispatch bookkeeping, all behind the one lock.
pub struct Guarded<S> {
    pub state: S,
    queue: VecDeque<Task>,
    shutdown: bool,
}

impl<S> Guarded<S> {
    /// Appends a task to the FIFO. Dropped silently after shutdown.
    pub fn defer(&mut self, task: Task) {
        if !self.shutdown {
            self.queue.push_back(task);
        }
    }

    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.queue.len()
    }
}

/// The single lock object of an environment: mutex over [`Guarded`] plus
/// the condvar the worker idles on.
pub struct SharedState<S> {
    inner: Mutex<Guarded<S>>,
    cond: Condvar,
}

impl<S> SharedState<S> {
    pub fn new(state: S) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Guarded {
                state,
                queue: VecDeque::new(),
                shutdown: false,
            }),
            cond: Condvar::new(),
        })
    }

    /// Acquires the lock, recovering from poisoning: a panicking
    /// listener must not take the whole environment down.
    pub fn lock(&self) -> MutexGuard<'_, Guarded<S>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Background dispatcher draining the shared FIFO. The worker thread is
/// started lazily on first use and lives until [`EventQueue::dispose`]
/// (or drop).
pub struct EventQueue<S> {
    shared: Arc<SharedState<S>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S: Send + 'static> EventQueue<S> {
    #[must_use]
    pub fn new(shared: Arc<SharedState<S>>) -> Self {
        Self {
            shared,
            worker: Mutex::new(None),
        }
    }

    /// Enqueues `task` and returns without waiting for it to run.
    /// Callable from any thread.
    pub fn invoke_later(&self, task: Task) {
        {
            let mut guard = self.shared.lock();
            if guard.shutdown {
                return;
            }
            guard.defer(task);
        }
        self.kick();
    }

    /// Ensures the worker exists and wakes it. Called by mutators after
    /// releasing the lock with tasks left in the queue.
    pub fn kick(&self) {
        self.ensure_worker();
        self.shared.cond.notify_one();
    }

    fn ensure_worker(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if worker.is_none() {
            let shared = Arc::clone(&self.shared);
            *worker = Some(
                std::thread::Builder::new()
                    .name("faunarium-dispatch".to_string())
                    .spawn(move || drain_loop(&shared))
                    .unwrap_or_else(|e| panic!("failed to spawn dispatch worker: {e}")),
            );
        }
    }

    /// Sets the kill flag and wakes the worker; already-queued tasks are
    /// drained, then the thread terminates and is joined. Idempotent.
    pub fn dispose(&self) {
        {
            let mut guard = self.shared.lock();
            guard.shutdown = true;
        }
        self.shared.cond.notify_one();
        let handle = {
            let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
            worker.take()
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("dispatch worker terminated by panic");
            }
        }
    }
}

impl<S> Drop for EventQueue<S> {
    fn drop(&mut self) {
        {
            let mut guard = self.shared.lock();
            guard.shutdown = true;
        }
        self.shared.cond.notify_one();
        let handle = {
            let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
            worker.take()
        };
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

/// Idle ⇄ draining loop. The guard is held across the whole drain and
/// only released while waiting on the condvar.
fn drain_loop<S>(shared: &SharedState<S>) {
    let mut guard = shared.lock();
    loop {
        if let Some(task) = guard.queue.pop_front() {
            if catch_unwind(AssertUnwindSafe(task)).is_err() {
                tracing::error!("listener notification panicked; dispatch continues");
            }
            continue;
        }
        if guard.shutdown {
            break;
        }
        guard = shared
            .cond
            .wait(guard)
            .unwrap_or_else(|e| e.into_inner());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn tasks_run_in_enqueue_order() {
        let shared = SharedState::new(());
        let queue = EventQueue::new(Arc::clone(&shared));
        let (tx, rx) = mpsc::channel();

        for i in 0..100 {
            let tx = tx.clone();
            queue.invoke_later(Box::new(move || {
                let _ = tx.send(i);
            }));
        }

        let seen: Vec<i32> = (0..100)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
        queue.dispose();
    }

    #[test]
    fn tasks_wait_for_the_mutator_to_release() {
        let shared = SharedState::new(0u32);
        let queue = EventQueue::new(Arc::clone(&shared));
        let (tx, rx) = mpsc::channel();

        {
            let mut guard = shared.lock();
            guard.state = 42;
            let tx = tx.clone();
            guard.defer(Box::new(move || {
                let _ = tx.send(());
            }));
            drop(guard);
            // Worker may not even exist yet; nothing can have run while
            // the critical section was open.
            queue.kick();
        }

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        queue.dispose();
    }

    #[test]
    fn mutator_holding_lock_blocks_the_drain() {
        let shared = SharedState::new(());
        let queue = EventQueue::new(Arc::clone(&shared));
        let ran = Arc::new(AtomicUsize::new(0));

        let guard = shared.lock();
        let ran_clone = Arc::clone(&ran);
        queue.kick();
        {
            // Push directly while holding the lock, as mutators do.
            let mut guard2 = guard;
            guard2.defer(Box::new(move || {
                ran_clone.fetch_add(1, Ordering::SeqCst);
            }));
            queue.kick();
            std::thread::sleep(Duration::from_millis(100));
            assert_eq!(ran.load(Ordering::SeqCst), 0);
            drop(guard2);
        }

        // Released: the drain may now run.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while ran.load(Ordering::SeqCst) == 0 {
            assert!(std::time::Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(5));
        }
        queue.dispose();
    }

    #[test]
    fn panicking_task_does_not_stop_dispatch() {
        let shared = SharedState::new(());
        let queue = EventQueue::new(Arc::clone(&shared));
        let (tx, rx) = mpsc::channel();

        queue.invoke_later(Box::new(|| panic!("listener failure")));
        queue.invoke_later(Box::new(move || {
            let _ = tx.send(());
        }));

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        queue.dispose();
    }

    #[test]
    fn dispose_drains_then_terminates() {
        let shared = SharedState::new(());
        let queue = EventQueue::new(Arc::clone(&shared));
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let ran = Arc::clone(&ran);
            queue.invoke_later(Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }
        queue.dispose();
        assert_eq!(ran.load(Ordering::SeqCst), 10);

        // After dispose, new tasks are dropped.
        let ran_clone = Arc::clone(&ran);
        queue.invoke_later(Box::new(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        }));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(ran.load(Ordering::SeqCst), 10);
    }
}
