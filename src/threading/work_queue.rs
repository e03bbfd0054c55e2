use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use log::{info, warn};
use rayon::ThreadPoolBuilder;
use thiserror::Error;

/// A background job panicked. Surfaced by [`AsyncWorkQueue::drain`] on the
/// tick after the failure; the job's callback is dropped, never fed another
/// job's result.
#[derive(Debug, Error)]
#[error("background worker failed: {message}")]
pub struct WorkerError {
    pub message: String,
}

type BoxedResult = Box<dyn Any + Send>;
type BoxedCallback = Box<dyn FnOnce(BoxedResult)>;

/// Thread-pool-backed request/callback queue with a single consuming
/// context.
///
/// `submit` runs the work function on a rayon pool; the finished result is
/// pushed onto a mutex-protected completed list, the only structure touched
/// from more than one thread. Callbacks stay on the consumer side, keyed by
/// ticket, so they may capture non-`Send` state (`Rc`s into the chunk
/// graph). `drain` hands each completed result to its callback in arrival
/// order, on the calling thread.
///
/// Not a process-wide singleton: each streamer owns its own instance.
pub struct AsyncWorkQueue {
    pool: rayon::ThreadPool,
    num_threads: usize,
    completed: Arc<Mutex<Vec<(u64, Result<BoxedResult, String>)>>>,
    callbacks: RefCell<HashMap<u64, BoxedCallback>>,
    next_ticket: Cell<u64>,
}

impl AsyncWorkQueue {
    /// Creates the queue with `size` worker threads. `size == 0` picks a
    /// default of all CPUs minus one (at least one), leaving a core for the
    /// consuming thread.
    pub fn new(size: usize) -> AsyncWorkQueue {
        let num_threads = if size > 0 {
            size
        } else {
            num_cpus::get().saturating_sub(1).max(1)
        };

        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .expect("failed to build worker thread pool");

        info!("AsyncWorkQueue: created thread pool with {num_threads} threads");

        AsyncWorkQueue {
            pool,
            num_threads,
            completed: Arc::new(Mutex::new(Vec::new())),
            callbacks: RefCell::new(HashMap::new()),
            next_ticket: Cell::new(0),
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Total jobs submitted over the queue's lifetime.
    pub fn submitted(&self) -> u64 {
        self.next_ticket.get()
    }

    /// Jobs whose callback has not run yet (queued, running, or completed
    /// but not yet drained).
    pub fn pending(&self) -> usize {
        self.callbacks.borrow().len()
    }

    /// Enqueues `work` on the pool; `callback` receives the result during a
    /// later [`drain`](Self::drain). The callback never crosses a thread
    /// boundary and always fires exactly once, unless the work panics, in
    /// which case it is dropped.
    pub fn submit<T, W, C>(&self, work: W, callback: C)
    where
        T: Send + 'static,
        W: FnOnce() -> T + Send + 'static,
        C: FnOnce(T) + 'static,
    {
        let ticket = self.next_ticket.get();
        self.next_ticket.set(ticket + 1);

        self.callbacks.borrow_mut().insert(
            ticket,
            Box::new(move |result| match result.downcast::<T>() {
                Ok(value) => callback(*value),
                Err(_) => warn!("AsyncWorkQueue: dropping result of unexpected type"),
            }),
        );

        let completed = Arc::clone(&self.completed);
        self.pool.spawn(move || {
            let entry = match catch_unwind(AssertUnwindSafe(work)) {
                Ok(value) => Ok(Box::new(value) as BoxedResult),
                Err(payload) => Err(panic_message(payload.as_ref())),
            };
            completed
                .lock()
                .expect("work queue completed list poisoned")
                .push((ticket, entry));
        });
    }

    /// Takes everything that completed since the last drain and invokes the
    /// callbacks synchronously, in arrival order, on the calling thread.
    /// Returns the number of callbacks invoked, or the first worker failure
    /// of the batch (after the batch's successful callbacks have run).
    pub fn drain(&self) -> Result<usize, WorkerError> {
        let finished = {
            let mut completed = self
                .completed
                .lock()
                .expect("work queue completed list poisoned");
            mem::take(&mut *completed)
        };

        let mut invoked = 0;
        let mut failure: Option<String> = None;
        for (ticket, entry) in finished {
            // Remove before invoking: a callback may submit follow-up work,
            // which needs the callback map free.
            let callback = self.callbacks.borrow_mut().remove(&ticket);
            match entry {
                Ok(result) => {
                    if let Some(callback) = callback {
                        callback(result);
                        invoked += 1;
                    }
                }
                Err(message) => {
                    warn!("AsyncWorkQueue: worker panicked: {message}");
                    failure.get_or_insert(message);
                }
            }
        }

        match failure {
            Some(message) => Err(WorkerError { message }),
            None => Ok(invoked),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
