use crate::common::EXECUTOR_THREAD_PREFIX;
use crate::errors::{ErrorKind, NitriteError, NitriteResult};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A fixed pool of worker threads fed from one unbounded queue.
///
/// The pool is owned by whoever creates it and handed to the components that
/// need background work (event dispatch). `shutdown` stops accepting work,
/// lets the workers drain what is already queued, and joins them.
#[derive(Clone)]
pub struct TaskExecutor {
    inner: Arc<ExecutorInner>,
}

struct ExecutorInner {
    name: String,
    sender: Mutex<Option<Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: AtomicBool,
}

impl TaskExecutor {
    pub fn new(name: &str, worker_count: usize) -> NitriteResult<Self> {
        let worker_count = worker_count.max(1);
        let (sender, receiver) = unbounded::<Task>();

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{}-{}", EXECUTOR_THREAD_PREFIX, name, index))
                .spawn(move || worker_loop(receiver))?;
            workers.push(handle);
        }

        log::debug!("Started executor {} with {} workers", name, worker_count);
        Ok(TaskExecutor {
            inner: Arc::new(ExecutorInner {
                name: name.to_string(),
                sender: Mutex::new(Some(sender)),
                workers: Mutex::new(workers),
                shutdown: AtomicBool::new(false),
            }),
        })
    }

    pub fn submit(&self, task: Task) -> NitriteResult<()> {
        let sender = self.inner.sender.lock();
        match sender.as_ref() {
            Some(sender) => sender.send(task).map_err(|_| {
                log::error!("Executor {} queue is disconnected", self.inner.name);
                NitriteError::new("Executor queue is disconnected", ErrorKind::InternalError)
            }),
            None => {
                log::error!("Executor {} is shut down", self.inner.name);
                Err(NitriteError::new(
                    "Executor is shut down",
                    ErrorKind::InvalidOperation,
                ))
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::SeqCst)
    }

    /// Stops intake, drains queued tasks and joins the workers.
    /// Calling it again is a no-op.
    pub fn shutdown(&self) {
        if self.inner.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        // dropping the sender disconnects the channel once the queue is empty
        self.inner.sender.lock().take();

        let current = thread::current().id();
        let workers: Vec<JoinHandle<()>> = self.inner.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.thread().id() == current {
                // shutdown requested from inside a task; that worker exits on its own
                continue;
            }
            if worker.join().is_err() {
                log::warn!("A worker of executor {} panicked during shutdown", self.inner.name);
            }
        }
        log::debug!("Executor {} shut down", self.inner.name);
    }
}

fn worker_loop(receiver: Receiver<Task>) {
    while let Ok(task) = receiver.recv() {
        if catch_unwind(AssertUnwindSafe(task)).is_err() {
            log::error!("A task panicked in {:?}", thread::current().name());
        }
    }
}
